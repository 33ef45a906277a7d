use std::{path::PathBuf, sync::Arc};

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::debug;

use crate::{
    metadata::{cache::MetadataCache, source::MetadataSource, CachedMetadata},
    models::GameRecord,
};

/// Field values a completed enrichment offers to a record.
///
/// Empty values are never applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPatch {
    /// Canonical store title.
    pub title: Option<String>,
    /// Short description.
    pub description: Option<String>,
    /// First listed developer.
    pub developer: Option<String>,
    /// First listed publisher.
    pub publisher: Option<String>,
    /// Release date as printed by the store.
    pub release_date: Option<String>,
    /// Genre labels.
    pub genres: Vec<String>,
    /// Local screenshot files.
    pub screenshots: Vec<PathBuf>,
    /// Local header artwork.
    pub header_image: Option<PathBuf>,
}

impl MetadataPatch {
    /// Build a patch from cached details and the images already on disk.
    pub fn from_cached(
        metadata: &CachedMetadata,
        header_image: Option<PathBuf>,
        screenshots: Vec<PathBuf>,
    ) -> Self {
        Self {
            title: first_listed(std::slice::from_ref(&metadata.name)),
            description: metadata.short_description.clone(),
            developer: first_listed(&metadata.developers),
            publisher: first_listed(&metadata.publishers),
            release_date: metadata.release_date.clone(),
            genres: metadata
                .genres
                .iter()
                .map(|genre| genre.trim().to_string())
                .filter(|genre| !genre.is_empty())
                .collect(),
            screenshots,
            header_image,
        }
    }

    /// Apply every non-empty field to `record`, returning whether anything changed.
    ///
    /// The title is replaced only when it differs from the current one ignoring case.
    pub fn apply_to(&self, record: &mut GameRecord) -> bool {
        let mut changed = false;

        if let Some(title) = non_empty(&self.title) {
            if !title.eq_ignore_ascii_case(&record.title) {
                record.title = title.to_string();
                changed = true;
            }
        }
        changed |= replace(&mut record.details.description, &self.description);
        changed |= replace(&mut record.details.developer, &self.developer);
        changed |= replace(&mut record.details.publisher, &self.publisher);
        changed |= replace(&mut record.details.release_date, &self.release_date);
        if !self.genres.is_empty() && record.details.genres != self.genres {
            record.details.genres = self.genres.clone();
            changed = true;
        }
        if !self.screenshots.is_empty() && record.screenshots != self.screenshots {
            record.screenshots = self.screenshots.clone();
            changed = true;
        }
        if let Some(header) = &self.header_image {
            if record.header_image.as_ref() != Some(header) {
                record.header_image = Some(header.clone());
                changed = true;
            }
        }

        changed
    }
}

fn first_listed(values: &[String]) -> Option<String> {
    values
        .iter()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn replace(slot: &mut Option<String>, value: &Option<String>) -> bool {
    match non_empty(value) {
        Some(value) if slot.as_deref() != Some(value) => {
            *slot = Some(value.to_string());
            true
        }
        _ => false,
    }
}

/// A completed enrichment addressed to a record by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentUpdate {
    /// Id of the record the patch belongs to.
    pub record_id: String,
    /// Application id the metadata was fetched for.
    pub app_id: u32,
    /// Values to apply.
    pub patch: MetadataPatch,
}

/// Spawns background metadata lookups and publishes their results.
///
/// The engine never touches records itself. Each lookup runs as its own task
/// and sends an [`EnrichmentUpdate`] to the receiver returned by
/// [`EnrichmentEngine::new`]; the owner of the records applies it by id.
pub struct EnrichmentEngine<S> {
    cache: Arc<MetadataCache<S>>,
    updates: UnboundedSender<EnrichmentUpdate>,
}

impl<S> Clone for EnrichmentEngine<S> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            updates: self.updates.clone(),
        }
    }
}

impl<S: MetadataSource> EnrichmentEngine<S> {
    /// Engine over `cache`, plus the receiving end of its update channel.
    pub fn new(cache: Arc<MetadataCache<S>>) -> (Self, UnboundedReceiver<EnrichmentUpdate>) {
        let (updates, receiver) = mpsc::unbounded_channel();
        (Self { cache, updates }, receiver)
    }

    /// Metadata cache backing the engine.
    pub fn cache(&self) -> &Arc<MetadataCache<S>> {
        &self.cache
    }

    /// Start enriching `record` in the background.
    ///
    /// Returns `None` without spawning when the record has no application id.
    /// Must be called from within a Tokio runtime.
    pub fn enrich(&self, record: &GameRecord, force: bool) -> Option<JoinHandle<()>> {
        let app_id = record.app_id?;
        let record_id = record.id.clone();
        let cache = Arc::clone(&self.cache);
        let updates = self.updates.clone();

        Some(tokio::spawn(async move {
            let Some(metadata) = cache.get(app_id, force).await else {
                debug!(app_id, %record_id, "No metadata available, record left unchanged");
                return;
            };
            let patch = MetadataPatch::from_cached(
                &metadata,
                cache.header_image_path(app_id),
                cache.screenshot_paths(app_id),
            );
            let update = EnrichmentUpdate {
                record_id,
                app_id,
                patch,
            };
            if updates.send(update).is_err() {
                debug!(app_id, "Update receiver dropped before enrichment finished");
            }
        }))
    }
}
