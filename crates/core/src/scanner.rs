//! End-to-end scan pass over the registered roots.
//!
//! A pass runs in three steps:
//!
//! 1. **Access check.** The scanner creates and lists a canary directory. When
//!    that fails and the front end supplied a [`FolderPicker`], the user is
//!    asked for a folder, which is registered as an `Other` root. The outcome
//!    is remembered for the lifetime of the scanner.
//! 2. **Discovery.** Every active root is walked on a blocking thread and
//!    each folder with a main executable becomes a [`GameRecord`]. Steam
//!    records with an application id are then handed to the enrichment engine,
//!    which publishes results on the channel returned by [`GameScanner::new`].
//! 3. **Fallback.** When nothing was found and no root is registered at all,
//!    the library is filled with sample records.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::{
    sync::{mpsc::UnboundedReceiver, OnceCell},
    task::JoinHandle,
};
use tracing::{error, info, warn};

use crate::{
    config::AppConfig,
    discovery::{CancelToken, DiscoveryOutcome, ExecutableClassifier, LibraryDiscovery},
    library::GameLibrary,
    metadata::{EnrichmentEngine, EnrichmentUpdate, MetadataCache, MetadataSource},
    models::{GameRecord, LauncherKind},
    paths::PathRegistry,
    samples,
};

/// Outcome of the filesystem access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessStatus {
    /// The canary directory could be created and listed.
    Granted,
    /// Access failed and no folder was picked.
    Denied,
    /// Access failed but the user picked this folder, which is now registered.
    GrantedVia(PathBuf),
}

impl AccessStatus {
    /// Whether at least some filesystem access is available.
    pub fn is_granted(&self) -> bool {
        !matches!(self, AccessStatus::Denied)
    }
}

/// Front-end hook asking the user for a folder the process may read.
pub trait FolderPicker: Send + Sync {
    /// Blocking prompt. `None` means the user declined.
    fn pick_folder(&self) -> Option<PathBuf>;
}

/// Everything a scan pass produced.
#[derive(Debug)]
pub struct ScanReport {
    /// Discovered records, or the samples.
    pub library: GameLibrary,
    /// Background enrichment tasks started by the pass.
    pub enrichments: Vec<JoinHandle<()>>,
    /// Whether the library holds sample records.
    pub used_samples: bool,
    /// Registered roots that could not be scanned.
    pub failed_roots: Vec<PathBuf>,
    /// Result of the access check preceding the pass.
    pub access: AccessStatus,
}

impl ScanReport {
    /// Wait for every enrichment started by the pass and apply the queued updates.
    ///
    /// Returns the number of records that changed.
    pub async fn wait_for_enrichment(
        &mut self,
        updates: &mut UnboundedReceiver<EnrichmentUpdate>,
    ) -> usize {
        for handle in self.enrichments.drain(..) {
            if let Err(err) = handle.await {
                warn!(%err, "Enrichment task ended abnormally");
            }
        }
        self.library.drain_updates(updates)
    }
}

/// Orchestrates access checks, discovery, enrichment, and the sample fallback.
pub struct GameScanner<S> {
    config: AppConfig,
    registry: Arc<PathRegistry>,
    engine: EnrichmentEngine<S>,
    picker: Option<Arc<dyn FolderPicker>>,
    cancel: Mutex<CancelToken>,
    access: OnceCell<AccessStatus>,
}

impl<S: MetadataSource> GameScanner<S> {
    /// Scanner over `registry`, enriching through `source`.
    ///
    /// Completed enrichments arrive on the returned receiver.
    pub fn new(
        config: AppConfig,
        registry: Arc<PathRegistry>,
        source: S,
    ) -> (Self, UnboundedReceiver<EnrichmentUpdate>) {
        let cache = Arc::new(MetadataCache::from_config(&config, source));
        let (engine, updates) = EnrichmentEngine::new(cache);
        let scanner = Self {
            config,
            registry,
            engine,
            picker: None,
            cancel: Mutex::new(CancelToken::new()),
            access: OnceCell::new(),
        };
        (scanner, updates)
    }

    /// Use `picker` when the access check fails.
    pub fn with_picker(mut self, picker: Arc<dyn FolderPicker>) -> Self {
        self.picker = Some(picker);
        self
    }

    /// Token that stops the running (or next) pass started by [`GameScanner::scan`].
    ///
    /// Once a cancelled pass returns, the scanner installs a fresh token, so
    /// later passes run normally.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.lock().clone()
    }

    /// Registered roots.
    pub fn registry(&self) -> &Arc<PathRegistry> {
        &self.registry
    }

    /// Metadata cache used for enrichment.
    pub fn cache(&self) -> &Arc<MetadataCache<S>> {
        self.engine.cache()
    }

    /// Configuration the scanner was built with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Probe filesystem access, asking for a folder on failure. Evaluated once per scanner.
    pub async fn check_access(&self) -> AccessStatus {
        self.access
            .get_or_init(|| self.probe_or_request())
            .await
            .clone()
    }

    async fn probe_or_request(&self) -> AccessStatus {
        let probe = self.config.probe_dir();
        let outcome = {
            let probe = probe.clone();
            tokio::task::spawn_blocking(move || probe_access(&probe)).await
        };
        match outcome {
            Ok(Ok(())) => {
                info!(probe = %probe.display(), "Filesystem access granted");
                return AccessStatus::Granted;
            }
            Ok(Err(err)) => warn!(probe = %probe.display(), ?err, "Filesystem access denied"),
            Err(err) => error!(%err, "Access probe task failed"),
        }

        let Some(picker) = self.picker.clone() else {
            return AccessStatus::Denied;
        };
        let picked = match tokio::task::spawn_blocking(move || picker.pick_folder()).await {
            Ok(picked) => picked,
            Err(err) => {
                error!(%err, "Folder picker task failed");
                None
            }
        };
        let Some(folder) = picked else {
            info!("No folder picked, continuing without filesystem access");
            return AccessStatus::Denied;
        };

        let name = folder
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| folder.display().to_string());
        match self.registry.add(&folder, name, LauncherKind::Other) {
            Ok(entry) => {
                info!(path = %entry.path.display(), "Registered picked folder");
                AccessStatus::GrantedVia(folder)
            }
            Err(err) => {
                warn!(path = %folder.display(), %err, "Picked folder could not be registered");
                AccessStatus::Denied
            }
        }
    }

    /// Run a full scan pass. Never fails; problems surface as an empty or sample library.
    pub async fn scan(&self) -> ScanReport {
        let cancel = self.cancel_token();
        let report = self.scan_with(cancel.clone()).await;
        if cancel.is_cancelled() {
            let mut current = self.cancel.lock();
            if current.is_cancelled() {
                *current = CancelToken::new();
            }
        }
        report
    }

    /// Run a scan pass that stops early once `cancel` is cancelled.
    pub async fn scan_with(&self, cancel: CancelToken) -> ScanReport {
        let access = self.check_access().await;
        let roots = self.registry.active_paths();
        let registered = self.registry.len();
        info!(active = roots.len(), registered, "Starting scan");

        let discovery = LibraryDiscovery::new(
            ExecutableClassifier::new(self.config.min_executable_bytes),
            cancel.clone(),
        );
        let outcome = match tokio::task::spawn_blocking(move || discovery.discover(&roots)).await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(%err, "Discovery task failed");
                DiscoveryOutcome::default()
            }
        };

        if cancel.is_cancelled() {
            warn!(
                found = outcome.records.len(),
                "Scan cancelled, returning a partial library"
            );
        }

        let mut library = GameLibrary::from_records(outcome.records);
        let enrichments: Vec<_> = library
            .iter()
            .filter(|record| record.is_enrichable())
            .filter_map(|record| self.engine.enrich(record, false))
            .collect();

        let used_samples = library.is_empty() && registered == 0;
        if used_samples {
            info!("Nothing registered and nothing found, showing sample games");
            library = GameLibrary::from_records(samples::sample_records());
        }

        info!(
            games = library.len(),
            enriching = enrichments.len(),
            failed_roots = outcome.failed_roots.len(),
            "Scan finished"
        );
        ScanReport {
            library,
            enrichments,
            used_samples,
            failed_roots: outcome.failed_roots,
            access,
        }
    }

    /// Force a fresh metadata fetch for `record` and publish the result.
    ///
    /// Returns `None` for records that cannot be enriched.
    pub fn refresh_metadata(&self, record: &GameRecord) -> Option<JoinHandle<()>> {
        if !record.is_enrichable() {
            return None;
        }
        self.engine.enrich(record, true)
    }
}

fn probe_access(probe: &Path) -> Result<()> {
    fs::create_dir_all(probe).with_context(|| format!("failed to create {}", probe.display()))?;
    fs::read_dir(probe).with_context(|| format!("failed to list {}", probe.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::FetchError, metadata::StoreApp};
    use std::{
        future::Future,
        sync::atomic::{AtomicUsize, Ordering},
    };
    use tempfile::{tempdir, TempDir};

    struct Offline;

    impl MetadataSource for Offline {
        fn fetch_details(
            &self,
            app_id: u32,
        ) -> impl Future<Output = Result<StoreApp, FetchError>> + Send {
            async move { Err(FetchError::Unsuccessful { app_id }) }
        }

        fn fetch_image(
            &self,
            _url: &str,
        ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
            async { Err(FetchError::Status(404)) }
        }
    }

    struct FixedPicker {
        folder: Option<PathBuf>,
        calls: AtomicUsize,
    }

    impl FolderPicker for FixedPicker {
        fn pick_folder(&self) -> Option<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.folder.clone()
        }
    }

    fn config_in(dir: &TempDir) -> AppConfig {
        AppConfig {
            data_root: dir.path().join("data"),
            cache_dir: dir.path().join("cache"),
            fallback_cache_dir: dir.path().join("fallback"),
            ..AppConfig::default()
        }
    }

    fn scanner(config: AppConfig) -> Result<GameScanner<Offline>> {
        let registry = Arc::new(PathRegistry::load(config.paths_file())?);
        Ok(GameScanner::new(config, registry, Offline).0)
    }

    #[tokio::test]
    async fn writable_probe_is_granted() -> Result<()> {
        let dir = tempdir()?;
        let scanner = scanner(config_in(&dir))?;
        assert_eq!(scanner.check_access().await, AccessStatus::Granted);
        assert!(dir.path().join("data").join("probe").is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn denied_probe_registers_the_picked_folder_once() -> Result<()> {
        let dir = tempdir()?;
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory")?;
        let picked = dir.path().join("My Games");
        fs::create_dir_all(&picked)?;

        let mut config = config_in(&dir);
        config.access_probe_dir = Some(blocker.join("probe"));
        let picker = Arc::new(FixedPicker {
            folder: Some(picked.clone()),
            calls: AtomicUsize::new(0),
        });
        let scanner = scanner(config)?.with_picker(picker.clone());

        assert_eq!(
            scanner.check_access().await,
            AccessStatus::GrantedVia(picked.clone())
        );
        assert!(scanner.check_access().await.is_granted());
        assert_eq!(picker.calls.load(Ordering::SeqCst), 1);

        let registered = scanner.registry().paths();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].name, "My Games");
        assert_eq!(registered[0].launcher_type, LauncherKind::Other);
        Ok(())
    }

    #[tokio::test]
    async fn denied_probe_without_picker_is_denied() -> Result<()> {
        let dir = tempdir()?;
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory")?;
        let mut config = config_in(&dir);
        config.access_probe_dir = Some(blocker.join("probe"));

        let scanner = scanner(config)?;
        assert_eq!(scanner.check_access().await, AccessStatus::Denied);
        Ok(())
    }

    #[tokio::test]
    async fn registered_but_empty_roots_do_not_fall_back_to_samples() -> Result<()> {
        let dir = tempdir()?;
        let empty_root = dir.path().join("Empty");
        fs::create_dir_all(&empty_root)?;
        let scanner = scanner(config_in(&dir))?;
        scanner
            .registry()
            .add(&empty_root, "Empty", LauncherKind::Other)?;

        let report = scanner.scan().await;
        assert!(!report.used_samples);
        assert!(report.library.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn refresh_ignores_records_without_app_id() -> Result<()> {
        let dir = tempdir()?;
        let scanner = scanner(config_in(&dir))?;
        for sample in samples::sample_records() {
            assert!(scanner.refresh_metadata(&sample).is_none());
        }
        Ok(())
    }
}
