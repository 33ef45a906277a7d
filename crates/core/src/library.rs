//! The authoritative in-memory game collection.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::{
    metadata::EnrichmentUpdate,
    models::{GameRecord, LauncherKind},
};

/// Games grouped into one ordered bucket per launcher.
///
/// Within a bucket records keep insertion order, which for a scan is discovery order.
#[derive(Debug, Clone, Default)]
pub struct GameLibrary {
    buckets: [Vec<GameRecord>; 4],
}

fn slot(kind: LauncherKind) -> usize {
    match kind {
        LauncherKind::Steam => 0,
        LauncherKind::Xbox => 1,
        LauncherKind::Epic => 2,
        LauncherKind::Other => 3,
    }
}

impl GameLibrary {
    /// Empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding `records` in the given order.
    pub fn from_records(records: impl IntoIterator<Item = GameRecord>) -> Self {
        let mut library = Self::new();
        for record in records {
            library.insert(record);
        }
        library
    }

    /// Add a record to the end of its launcher bucket, replacing any record with the same id.
    pub fn insert(&mut self, record: GameRecord) {
        self.remove(&record.id);
        self.buckets[slot(record.launcher)].push(record);
    }

    /// Record with the given id.
    pub fn get(&self, id: &str) -> Option<&GameRecord> {
        self.iter().find(|record| record.id == id)
    }

    /// Mutable access to the record with the given id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut GameRecord> {
        self.buckets
            .iter_mut()
            .flat_map(|bucket| bucket.iter_mut())
            .find(|record| record.id == id)
    }

    /// Every record, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = &GameRecord> {
        self.buckets.iter().flatten()
    }

    /// Records of one launcher in insertion order.
    pub fn bucket(&self, kind: LauncherKind) -> &[GameRecord] {
        &self.buckets[slot(kind)]
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Whether every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Remove and return the record with the given id.
    pub fn remove(&mut self, id: &str) -> Option<GameRecord> {
        self.buckets.iter_mut().find_map(|bucket| {
            let index = bucket.iter().position(|record| record.id == id)?;
            Some(bucket.remove(index))
        })
    }

    /// Stamp the record as played at `now`. Returns `false` when the id is unknown.
    pub fn mark_played(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        match self.get_mut(id) {
            Some(record) => {
                record.last_played = now;
                true
            }
            None => false,
        }
    }

    /// Apply a completed enrichment. Updates for records no longer present are dropped.
    pub fn apply(&mut self, update: &EnrichmentUpdate) -> bool {
        match self.get_mut(&update.record_id) {
            Some(record) if record.app_id == Some(update.app_id) => update.patch.apply_to(record),
            Some(_) => {
                debug!(record_id = %update.record_id, app_id = update.app_id, "Stale enrichment for a different app id");
                false
            }
            None => {
                debug!(record_id = %update.record_id, "Enrichment for a removed record dropped");
                false
            }
        }
    }

    /// Apply every update already waiting on `updates`, returning how many changed a record.
    pub fn drain_updates(&mut self, updates: &mut UnboundedReceiver<EnrichmentUpdate>) -> usize {
        let mut applied = 0;
        while let Ok(update) = updates.try_recv() {
            if self.apply(&update) {
                applied += 1;
            }
        }
        applied
    }

    /// Records most recently played first.
    pub fn recently_played(&self, limit: usize) -> Vec<&GameRecord> {
        let mut records: Vec<_> = self.iter().collect();
        records.sort_by(|a, b| b.last_played.cmp(&a.last_played));
        records.truncate(limit);
        records
    }

    /// Consume the library into a flat list, bucket by bucket.
    pub fn into_records(self) -> Vec<GameRecord> {
        self.buckets.into_iter().flatten().collect()
    }
}
