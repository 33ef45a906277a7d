//! Durable storage for game records and user preferences.
//!
//! Both stores keep their contents in memory and rewrite their JSON file in
//! full on every change. A change becomes visible only after it reached disk.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{bail, Result};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::{models::GameRecord, persist};

/// Persistence collaborator for game records.
pub trait GameStore {
    /// Insert `record`, replacing a stored record with the same id.
    fn save(&self, record: &GameRecord) -> Result<()>;
    /// Every stored record in insertion order.
    fn load(&self) -> Result<Vec<GameRecord>>;
    /// Overwrite an existing record. Fails when the id is not stored.
    fn update(&self, record: &GameRecord) -> Result<()>;
    /// Remove the record with `id`, returning whether it existed.
    fn delete(&self, id: &str) -> Result<bool>;
}

/// [`GameStore`] backed by a JSON array on disk.
pub struct JsonGameStore {
    file: PathBuf,
    records: RwLock<Vec<GameRecord>>,
}

impl JsonGameStore {
    /// Open the store at `file`. A missing file is an empty store.
    pub fn open(file: impl Into<PathBuf>) -> Result<Self> {
        let file = file.into();
        let records = persist::read_json::<Vec<GameRecord>>(&file)?.unwrap_or_default();
        debug!(count = records.len(), file = %file.display(), "Opened game store");
        Ok(Self {
            file,
            records: RwLock::new(records),
        })
    }

    /// Backing file.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Stored record with `id`.
    pub fn get(&self, id: &str) -> Option<GameRecord> {
        self.records.read().iter().find(|r| r.id == id).cloned()
    }

    /// Replace the whole store with `records`.
    pub fn replace_all(&self, records: &[GameRecord]) -> Result<()> {
        self.mutate(|stored| {
            *stored = records.to_vec();
            Ok(())
        })
    }

    fn mutate<T>(&self, change: impl FnOnce(&mut Vec<GameRecord>) -> Result<T>) -> Result<T> {
        let mut guard = self.records.write();
        let mut next = guard.clone();
        let outcome = change(&mut next)?;
        persist::write_json_atomic(&self.file, &next)?;
        *guard = next;
        Ok(outcome)
    }
}

impl GameStore for JsonGameStore {
    fn save(&self, record: &GameRecord) -> Result<()> {
        self.mutate(|stored| {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
            Ok(())
        })
    }

    fn load(&self) -> Result<Vec<GameRecord>> {
        Ok(self.records.read().clone())
    }

    fn update(&self, record: &GameRecord) -> Result<()> {
        self.mutate(|stored| {
            let Some(existing) = stored.iter_mut().find(|r| r.id == record.id) else {
                bail!("no stored game with id {}", record.id);
            };
            *existing = record.clone();
            Ok(())
        })
    }

    fn delete(&self, id: &str) -> Result<bool> {
        if self.get(id).is_none() {
            return Ok(false);
        }
        self.mutate(|stored| {
            stored.retain(|r| r.id != id);
            Ok(true)
        })
    }
}

/// Copy play time and last-played stamps from `previous` onto `records`
/// sharing the same install location.
pub fn carry_over_history(records: &mut [GameRecord], previous: &[GameRecord]) {
    for record in records.iter_mut() {
        let Some(old) = previous
            .iter()
            .find(|old| !old.is_sample && old.install_location == record.install_location)
        else {
            continue;
        };
        record.play_time_minutes = old.play_time_minutes;
        if old.last_played > record.last_played {
            record.last_played = old.last_played;
        }
    }
}

/// String key/value user preferences stored as a JSON object.
pub struct Preferences {
    file: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl Preferences {
    /// Open preferences at `file`. A missing or unreadable file starts empty.
    pub fn open(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let values = match persist::read_json::<BTreeMap<String, String>>(&file) {
            Ok(values) => values.unwrap_or_default(),
            Err(err) => {
                warn!(?err, file = %file.display(), "Preferences unreadable, starting empty");
                BTreeMap::new()
            }
        };
        Self {
            file,
            values: RwLock::new(values),
        }
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Store `value` under `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let mut guard = self.values.write();
        let mut next = guard.clone();
        next.insert(key.into(), value.into());
        persist::write_json_atomic(&self.file, &next)?;
        *guard = next;
        Ok(())
    }

    /// Remove `key`, returning its previous value.
    pub fn remove(&self, key: &str) -> Result<Option<String>> {
        let mut guard = self.values.write();
        if !guard.contains_key(key) {
            return Ok(None);
        }
        let mut next = guard.clone();
        let previous = next.remove(key);
        persist::write_json_atomic(&self.file, &next)?;
        *guard = next;
        Ok(previous)
    }
}
