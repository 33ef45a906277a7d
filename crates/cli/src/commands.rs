use std::{env, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Args, Subcommand};
use gamecenter_core::{
    launch::launch_record,
    metadata::{resolve_cache_dir, MetadataPatch},
    store::carry_over_history,
    AppConfig, EnrichmentUpdate, GameLibrary, GameRecord, GameScanner, GameStore, JsonGameStore,
    LauncherKind, MetadataCache, PathRegistry, Preferences, ScanReport, SteamStoreClient,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::picker::StdinFolderPicker;

const LAST_SCAN_KEY: &str = "last_scan";

#[derive(Args)]
pub struct ScanArgs {
    /// Print the library after store metadata has been applied
    #[arg(long)]
    wait_enrichment: bool,
}

#[derive(Subcommand)]
pub enum PathsAction {
    /// List registered folders
    List,

    /// Register a folder
    Add {
        /// Folder to scan
        path: PathBuf,
        /// Display name (defaults to the folder name)
        #[arg(long)]
        name: Option<String>,
        /// Launcher the games below belong to: steam, xbox, epic, or other
        #[arg(long, default_value = "other")]
        launcher: LauncherKind,
    },

    /// Forget a folder
    Remove {
        /// Folder id as printed by `paths list`
        id: String,
    },

    /// Resume scanning a folder
    Enable {
        /// Folder id
        id: String,
    },

    /// Keep a folder registered but skip it when scanning
    Disable {
        /// Folder id
        id: String,
    },

    /// Change the display name of a folder
    Rename {
        /// Folder id
        id: String,
        /// New display name
        name: String,
    },
}

pub async fn scan(config: &AppConfig, args: ScanArgs) -> Result<()> {
    let registry = Arc::new(PathRegistry::load(config.paths_file())?);
    let client = SteamStoreClient::new(config)?;
    let (scanner, mut updates) = GameScanner::new(config.clone(), registry, client);
    let scanner = scanner.with_picker(Arc::new(StdinFolderPicker));

    let report = scanner.scan().await;
    for root in &report.failed_roots {
        println!("warning: could not scan {}", root.display());
    }
    if report.used_samples {
        print_library(&report.library);
        println!("No folders registered yet. Add one with `gamecenter paths add <folder>`.");
        return Ok(());
    }
    if !args.wait_enrichment {
        print_library(&report.library);
    }

    let store = JsonGameStore::open(config.games_file())?;
    let library = persist_scan(report, &mut updates, &store).await?;
    if args.wait_enrichment {
        print_library(&library);
    }

    let prefs = Preferences::open(config.preferences_file());
    prefs.set(LAST_SCAN_KEY, Utc::now().to_rfc3339())?;
    Ok(())
}

/// Wait for the pass's enrichments, then store its records with their play history.
async fn persist_scan(
    mut report: ScanReport,
    updates: &mut UnboundedReceiver<EnrichmentUpdate>,
    store: &JsonGameStore,
) -> Result<GameLibrary> {
    let changed = report.wait_for_enrichment(updates).await;
    info!(changed, "Applied store metadata");

    let previous = store.load()?;
    let mut records = report.library.into_records();
    carry_over_history(&mut records, &previous);
    store.replace_all(&records)?;
    Ok(GameLibrary::from_records(records))
}

fn print_library(library: &GameLibrary) {
    for kind in LauncherKind::ALL {
        let bucket = library.bucket(kind);
        if bucket.is_empty() {
            continue;
        }
        println!("{kind} ({})", bucket.len());
        for record in bucket {
            print_record(record);
        }
    }
}

fn print_record(record: &GameRecord) {
    let last_played = record.last_played.with_timezone(&Local).format("%Y-%m-%d");
    println!(
        "  [{}] {}  (last played {last_played}, {} min)",
        record.id, record.title, record.play_time_minutes
    );
    println!("        {}", record.launch_target);
    if let Some(developer) = &record.details.developer {
        println!("        by {developer}");
    }
}

pub fn paths(config: &AppConfig, action: PathsAction) -> Result<()> {
    let registry = PathRegistry::load(config.paths_file())?;

    match action {
        PathsAction::List => {
            if registry.is_empty() {
                println!("No folders registered.");
            }
            for entry in registry.paths() {
                let state = if entry.is_active { "active" } else { "disabled" };
                println!(
                    "{}  {:<6} {:<8} {}  ({})",
                    entry.id,
                    entry.launcher_type,
                    state,
                    entry.name,
                    entry.path.display()
                );
            }
        }
        PathsAction::Add {
            path,
            name,
            launcher,
        } => {
            let path = if path.is_absolute() {
                path
            } else {
                env::current_dir()?.join(path)
            };
            let name = name.unwrap_or_else(|| {
                path.file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string())
            });
            let entry = registry.add(&path, name, launcher)?;
            println!("Registered {} as {}", entry.path.display(), entry.id);
        }
        PathsAction::Remove { id } => {
            let entry = registry.remove(&id)?;
            println!("Removed {}", entry.path.display());
        }
        PathsAction::Enable { id } => {
            let entry = registry.set_active(&id, true)?;
            println!("Enabled {}", entry.path.display());
        }
        PathsAction::Disable { id } => {
            let entry = registry.set_active(&id, false)?;
            println!("Disabled {}", entry.path.display());
        }
        PathsAction::Rename { id, name } => {
            let entry = registry.rename(&id, name)?;
            println!("Renamed {} to {}", entry.path.display(), entry.name);
        }
    }

    Ok(())
}

pub async fn refresh(config: &AppConfig, app_id: u32) -> Result<()> {
    let cache = MetadataCache::from_config(config, SteamStoreClient::new(config)?);
    let Some(metadata) = cache.get(app_id, true).await else {
        println!("No store metadata available for app {app_id}; try again later.");
        return Ok(());
    };
    println!("{}", serde_json::to_string_pretty(&metadata)?);

    let patch = MetadataPatch::from_cached(
        &metadata,
        cache.header_image_path(app_id),
        cache.screenshot_paths(app_id),
    );
    let store = JsonGameStore::open(config.games_file())?;
    for mut record in store.load()? {
        if record.app_id == Some(app_id) && patch.apply_to(&mut record) {
            store.update(&record)?;
            info!(id = %record.id, title = %record.title, "Updated stored game");
        }
    }
    Ok(())
}

pub async fn launch(config: &AppConfig, game_id: &str) -> Result<()> {
    let store = JsonGameStore::open(config.games_file())?;
    let mut library = GameLibrary::from_records(store.load()?);
    let record = library
        .get(game_id)
        .cloned()
        .with_context(|| format!("no game with id {game_id}; run `gamecenter scan` first"))?;

    launch_record(&record).await?;

    if library.mark_played(game_id, Utc::now()) {
        if let Some(played) = library.get(game_id) {
            if let Err(err) = store.update(played) {
                warn!(?err, "Unable to record last played time");
            }
        }
    }
    println!("Launched {}", record.title);
    Ok(())
}

pub fn cache_dir(config: &AppConfig) {
    let dir = resolve_cache_dir(&config.cache_dir, &config.fallback_cache_dir);
    println!("{}", dir.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamecenter_core::{
        metadata::{parse_app_details, StoreApp},
        FetchError, MetadataSource,
    };
    use std::{fs, future::Future, path::Path};
    use tempfile::tempdir;

    struct Portal2Store;

    impl MetadataSource for Portal2Store {
        fn fetch_details(
            &self,
            app_id: u32,
        ) -> impl Future<Output = Result<StoreApp, FetchError>> + Send {
            let body = r#"{ "620": { "success": true, "data": {
                "name": "Portal 2",
                "developers": ["Valve"],
                "publishers": ["Valve"]
            } } }"#;
            let parsed = parse_app_details(app_id, body);
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                parsed
            }
        }

        fn fetch_image(
            &self,
            _url: &str,
        ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
            async { Err(FetchError::Status(404)) }
        }
    }

    fn steam_library(root: &Path) -> Result<()> {
        let steamapps = root.join("steamapps");
        let game = steamapps.join("common").join("Portal2");
        fs::create_dir_all(&game)?;
        fs::write(game.join("portal2.exe"), vec![0u8; 300 * 1024])?;
        fs::write(
            steamapps.join("appmanifest_620.acf"),
            "\"AppState\"\n{\n\t\"appid\"\t\t\"620\"\n\t\"installdir\"\t\t\"Portal2\"\n}\n",
        )?;
        Ok(())
    }

    #[tokio::test]
    async fn persisted_scan_carries_store_metadata() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig {
            data_root: dir.path().join("state"),
            cache_dir: dir.path().join("cache"),
            fallback_cache_dir: dir.path().join("fallback"),
            ..AppConfig::default()
        };
        let root = dir.path().join("SteamLibrary");
        steam_library(&root)?;
        let registry = Arc::new(PathRegistry::load(config.paths_file())?);
        registry.add(&root, "Steam", LauncherKind::Steam)?;

        let (scanner, mut updates) = GameScanner::new(config.clone(), registry, Portal2Store);
        let report = scanner.scan().await;
        assert_eq!(report.enrichments.len(), 1);

        let store = JsonGameStore::open(config.games_file())?;
        persist_scan(report, &mut updates, &store).await?;

        let stored = store.load()?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].details.developer.as_deref(), Some("Valve"));
        Ok(())
    }
}
