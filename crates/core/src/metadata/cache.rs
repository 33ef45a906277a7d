//! On-disk metadata cache keyed by application id.
//!
//! Layout inside the cache directory:
//!
//! ```text
//! {app_id}.json          cached store details
//! {app_id}_header.png    header artwork
//! {app_id}_image{n}.png  screenshots, n starting at 1
//! ```
//!
//! Names are derived from the id alone, so the images for an id can be
//! rediscovered by probing the directory without a separate index.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    metadata::source::{MetadataSource, StoreApp},
    persist,
};

/// Store details persisted for one application id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedMetadata {
    /// Application id the entry was fetched for.
    pub app_id: u32,
    /// Display name.
    pub name: String,
    /// One-paragraph description.
    #[serde(default)]
    pub short_description: Option<String>,
    /// Developer names.
    #[serde(default)]
    pub developers: Vec<String>,
    /// Publisher names.
    #[serde(default)]
    pub publishers: Vec<String>,
    /// Human formatted release date.
    #[serde(default)]
    pub release_date: Option<String>,
    /// Genre labels.
    #[serde(default)]
    pub genres: Vec<String>,
    /// Remote header artwork URL.
    #[serde(default)]
    pub header_image_url: Option<String>,
    /// Remote screenshot URLs, already capped.
    #[serde(default)]
    pub screenshot_urls: Vec<String>,
    /// When the entry was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl CachedMetadata {
    /// Flatten a store payload, keeping at most `max_screenshots` screenshot URLs.
    pub fn from_store(app_id: u32, app: StoreApp, max_screenshots: usize) -> Self {
        Self {
            app_id,
            name: app.name.trim().to_string(),
            short_description: non_blank(app.short_description),
            developers: app.developers,
            publishers: app.publishers,
            release_date: non_blank(app.release_date.and_then(|release| release.date)),
            genres: app.genres.into_iter().map(|genre| genre.description).collect(),
            header_image_url: non_blank(app.header_image),
            screenshot_urls: app
                .screenshots
                .into_iter()
                .map(|shot| shot.path_full)
                .filter(|url| !url.trim().is_empty())
                .take(max_screenshots)
                .collect(),
            fetched_at: Utc::now(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read-through cache in front of a [`MetadataSource`].
///
/// Fetches and writes for the same id are serialised, so overlapping forced
/// refreshes cannot interleave their writes. Different ids never contend.
pub struct MetadataCache<S> {
    dir: PathBuf,
    source: S,
    max_screenshots: usize,
    locks: Mutex<HashMap<u32, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: MetadataSource> MetadataCache<S> {
    /// Cache rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>, source: S, max_screenshots: usize) -> Self {
        Self {
            dir: dir.into(),
            source,
            max_screenshots,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Cache in the configured directory, or its fallback when that is not writable.
    pub fn from_config(config: &AppConfig, source: S) -> Self {
        let dir = resolve_cache_dir(&config.cache_dir, &config.fallback_cache_dir);
        Self::new(dir, source, config.max_screenshots)
    }

    /// Directory holding cached entries and images.
    pub fn cache_dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cached details for `app_id`.
    pub fn metadata_path(&self, app_id: u32) -> PathBuf {
        self.dir.join(format!("{app_id}.json"))
    }

    fn header_path(&self, app_id: u32) -> PathBuf {
        self.dir.join(format!("{app_id}_header.png"))
    }

    fn screenshot_path(&self, app_id: u32, index: usize) -> PathBuf {
        self.dir.join(format!("{app_id}_image{index}.png"))
    }

    /// Cached details for `app_id`, fetching them when missing or when `force` is set.
    ///
    /// Any failure yields `None` after being logged; absence means "try later".
    pub async fn get(&self, app_id: u32, force: bool) -> Option<CachedMetadata> {
        let lock = self.lock_for(app_id);
        let found = {
            let _guard = lock.lock().await;
            self.read_through(app_id, force).await
        };
        self.release_lock(app_id, lock);
        found
    }

    async fn read_through(&self, app_id: u32, force: bool) -> Option<CachedMetadata> {
        if !force {
            if let Some(cached) = self.peek(app_id) {
                debug!(app_id, "Metadata cache hit");
                return Some(cached);
            }
        }

        let app = match self.source.fetch_details(app_id).await {
            Ok(app) => app,
            Err(err) => {
                warn!(app_id, %err, "Store metadata unavailable");
                return None;
            }
        };

        let metadata = CachedMetadata::from_store(app_id, app, self.max_screenshots);
        let path = self.metadata_path(app_id);
        match persist::write_json_atomic(&path, &metadata) {
            Ok(()) => info!(app_id, name = %metadata.name, "Cached store metadata"),
            Err(err) => warn!(app_id, ?err, "Unable to write metadata cache entry"),
        }

        self.download_images(&metadata).await;
        Some(metadata)
    }

    /// Cached details for `app_id` without touching the remote source.
    pub fn peek(&self, app_id: u32) -> Option<CachedMetadata> {
        let path = self.metadata_path(app_id);
        match persist::read_json::<CachedMetadata>(&path) {
            Ok(Some(cached)) if cached.app_id == app_id => Some(cached),
            Ok(Some(cached)) => {
                warn!(app_id, found = cached.app_id, "Cache entry belongs to another app id");
                None
            }
            Ok(None) => None,
            Err(err) => {
                warn!(app_id, ?err, "Cached metadata is malformed");
                None
            }
        }
    }

    /// Local header artwork for `app_id`, if it has been downloaded.
    pub fn header_image_path(&self, app_id: u32) -> Option<PathBuf> {
        Some(self.header_path(app_id)).filter(|path| path.is_file())
    }

    /// Local screenshots for `app_id`, in index order up to the first gap.
    pub fn screenshot_paths(&self, app_id: u32) -> Vec<PathBuf> {
        (1..)
            .map(|index| self.screenshot_path(app_id, index))
            .take_while(|path| path.is_file())
            .collect()
    }

    /// Every local image for `app_id`: the header first, then the screenshots.
    pub fn local_image_paths(&self, app_id: u32) -> Vec<PathBuf> {
        self.header_image_path(app_id)
            .into_iter()
            .chain(self.screenshot_paths(app_id))
            .collect()
    }

    fn lock_for(&self, app_id: u32) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock().entry(app_id).or_default().clone()
    }

    /// Drop the map entry once no other caller holds or waits on it.
    fn release_lock(&self, app_id: u32, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock();
        drop(lock);
        if locks
            .get(&app_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&app_id);
        }
    }

    async fn download_images(&self, metadata: &CachedMetadata) {
        let header = metadata
            .header_image_url
            .iter()
            .map(|url| (url, self.header_path(metadata.app_id)));
        let screenshots = metadata
            .screenshot_urls
            .iter()
            .enumerate()
            .map(|(index, url)| (url, self.screenshot_path(metadata.app_id, index + 1)));

        for (url, target) in header.chain(screenshots) {
            if target.exists() {
                continue;
            }
            match self.source.fetch_image(url).await {
                Ok(bytes) => {
                    if let Err(err) = persist::write_bytes_atomic(&target, &bytes) {
                        warn!(path = %target.display(), ?err, "Unable to store image");
                    }
                }
                Err(err) => {
                    warn!(app_id = metadata.app_id, %url, %err, "Image download failed");
                }
            }
        }
    }
}

/// Pick the cache directory: `primary` when it can be created and written, else `fallback`.
pub fn resolve_cache_dir(primary: &Path, fallback: &Path) -> PathBuf {
    match probe_writable(primary) {
        Ok(()) => primary.to_path_buf(),
        Err(err) => {
            warn!(
                primary = %primary.display(),
                fallback = %fallback.display(),
                %err,
                "Cache directory not writable, using fallback"
            );
            if let Err(err) = fs::create_dir_all(fallback) {
                warn!(fallback = %fallback.display(), %err, "Unable to create fallback cache directory");
            }
            fallback.to_path_buf()
        }
    }
}

fn probe_writable(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    NamedTempFile::new_in(dir).map(drop)
}
