//! Game discovery: walking scan roots and turning candidate folders into records.

/// Main-executable detection and ranking.
pub mod executables;
/// Title resolution waterfall.
pub mod identity;
/// Steam manifest lookups.
pub mod manifest;
/// Recursive candidate-folder enumeration.
pub mod walker;

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::models::{GamePath, GameRecord, LaunchTarget, LauncherKind};

pub use executables::{ExecutableCandidate, ExecutableClassifier};
pub use identity::IdentityResolver;
pub use manifest::{ManifestMatch, ManifestReader};
pub use walker::{CancelToken, CandidateFolder, DirectoryWalker};

/// First id handed to discovered records; lower ids are reserved for samples.
pub const FIRST_DISCOVERED_ID: u32 = 1000;

/// Records found during one pass plus the roots that could not be scanned.
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    /// Discovered records in discovery order.
    pub records: Vec<GameRecord>,
    /// Registered roots that were missing or unreadable.
    pub failed_roots: Vec<PathBuf>,
}

/// Synchronous discovery pass over a set of scan roots.
///
/// Blocking filesystem work; async callers run it on a blocking thread.
#[derive(Debug, Clone)]
pub struct LibraryDiscovery {
    classifier: ExecutableClassifier,
    resolver: IdentityResolver,
    cancel: CancelToken,
}

impl LibraryDiscovery {
    /// Build a discovery pass.
    pub fn new(classifier: ExecutableClassifier, cancel: CancelToken) -> Self {
        Self {
            classifier,
            resolver: IdentityResolver::new(),
            cancel,
        }
    }

    /// Walk every root and build a record for each folder with a main executable.
    ///
    /// A root whose canonical path was already scanned in this pass is skipped,
    /// as is any folder already claimed by an earlier (overlapping) root.
    pub fn discover(&self, roots: &[GamePath]) -> DiscoveryOutcome {
        let walker = DirectoryWalker::new(self.cancel.clone());
        let mut outcome = DiscoveryOutcome::default();
        let mut scanned_roots = HashSet::new();
        let mut claimed_folders = HashSet::new();
        let mut next_id = FIRST_DISCOVERED_ID;

        for root in roots {
            if self.cancel.is_cancelled() {
                info!("Scan cancelled");
                break;
            }
            if !root.path.is_dir() {
                warn!(path = %root.path.display(), "Registered path is missing or not a directory");
                outcome.failed_roots.push(root.path.clone());
                continue;
            }
            if let Err(err) = fs::read_dir(&root.path) {
                warn!(path = %root.path.display(), %err, "Registered path is not readable");
                outcome.failed_roots.push(root.path.clone());
                continue;
            }
            if !scanned_roots.insert(canonical(&root.path)) {
                debug!(path = %root.path.display(), "Root already scanned in this pass");
                continue;
            }

            let before = outcome.records.len();
            for candidate in walker.walk(&root.path) {
                if !claimed_folders.insert(canonical(&candidate.path)) {
                    continue;
                }
                if let Some(record) =
                    self.build_record(&candidate.path, root.launcher_type, next_id)
                {
                    next_id += 1;
                    outcome.records.push(record);
                }
            }
            info!(
                path = %root.path.display(),
                launcher = %root.launcher_type,
                found = outcome.records.len() - before,
                "Scanned registered path"
            );
        }

        outcome
    }

    /// Build the record for one candidate folder, or `None` when it has no main executable.
    pub fn build_record(
        &self,
        folder: &Path,
        launcher: LauncherKind,
        id: u32,
    ) -> Option<GameRecord> {
        let main = self.classifier.main_executable(folder)?;

        let manifest = match launcher {
            LauncherKind::Steam => ManifestReader::resolve_from_manifests(folder),
            _ => ManifestMatch::default(),
        };
        let title = self
            .resolver
            .resolve_with_manifest(folder, Some(&main.path), &manifest);
        let launch_target =
            LaunchTarget::for_game(launcher, manifest.app_id, folder, &main.path);
        debug!(
            folder = %folder.display(),
            executable = %main.path.display(),
            %title,
            app_id = ?manifest.app_id,
            "Discovered game"
        );

        Some(GameRecord {
            id: id.to_string(),
            title,
            launcher,
            install_location: folder.to_path_buf(),
            last_played: last_modified(&main.path),
            executable_path: Some(main.path),
            app_id: manifest.app_id,
            launch_target,
            play_time_minutes: 0,
            screenshots: Vec::new(),
            header_image: None,
            details: Default::default(),
            is_sample: false,
        })
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn last_modified(path: &Path) -> DateTime<Utc> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now() - Duration::days(30))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn discovery() -> LibraryDiscovery {
        LibraryDiscovery::new(ExecutableClassifier::default(), CancelToken::new())
    }

    #[test]
    fn folders_without_qualifying_executables_produce_no_record() -> Result<()> {
        let dir = tempdir()?;
        let folder = dir.path().join("Tools");
        fs::create_dir_all(&folder)?;
        fs::write(folder.join("setup.exe"), vec![0u8; 400 * 1024])?;
        fs::write(folder.join("helper.exe"), vec![0u8; 4 * 1024])?;

        assert!(discovery()
            .build_record(&folder, LauncherKind::Other, 1000)
            .is_none());
        Ok(())
    }

    #[test]
    fn overlapping_roots_do_not_duplicate_records() -> Result<()> {
        let dir = tempdir()?;
        let outer = dir.path().join("Games");
        let inner = outer.join("Celeste");
        fs::create_dir_all(&inner)?;
        fs::write(inner.join("Celeste.exe"), vec![0u8; 200 * 1024])?;

        let roots = vec![
            GamePath::new(&outer, "Games", LauncherKind::Other),
            GamePath::new(&inner, "Celeste", LauncherKind::Epic),
            GamePath::new(&outer, "Games again", LauncherKind::Xbox),
        ];
        let outcome = discovery().discover(&roots);

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].launcher, LauncherKind::Other);
        assert_eq!(outcome.records[0].id, "1000");
        assert!(outcome.failed_roots.is_empty());
        Ok(())
    }

    #[test]
    fn missing_roots_are_reported_and_skipped() -> Result<()> {
        let dir = tempdir()?;
        let good = dir.path().join("Good");
        fs::create_dir_all(good.join("Hades"))?;
        fs::write(good.join("Hades").join("Hades.exe"), vec![0u8; 200 * 1024])?;
        let missing = dir.path().join("Unplugged");

        let roots = vec![
            GamePath::new(&missing, "Unplugged", LauncherKind::Other),
            GamePath::new(&good, "Good", LauncherKind::Epic),
        ];
        let outcome = discovery().discover(&roots);

        assert_eq!(outcome.failed_roots, vec![missing]);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].title, "Hades");
        assert_eq!(
            outcome.records[0].launch_target,
            LaunchTarget::Uri("com.epicgames.launcher://apps/Hades?action=launch".to_string())
        );
        Ok(())
    }

    #[test]
    fn cancelled_discovery_returns_nothing_new() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("Game"))?;
        fs::write(dir.path().join("Game/Game.exe"), vec![0u8; 200 * 1024])?;

        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = LibraryDiscovery::new(ExecutableClassifier::default(), cancel)
            .discover(&[GamePath::new(dir.path(), "Root", LauncherKind::Other)]);
        assert!(outcome.records.is_empty());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_root_fails_alone() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir()?;
        let locked = dir.path().join("Locked");
        fs::create_dir_all(locked.join("Hades"))?;
        fs::write(locked.join("Hades/Hades.exe"), vec![0u8; 200 * 1024])?;
        let open = dir.path().join("Open");
        fs::create_dir_all(open.join("Celeste"))?;
        fs::write(open.join("Celeste/Celeste.exe"), vec![0u8; 200 * 1024])?;

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;
        if fs::read_dir(&locked).is_ok() {
            // Permission bits are not enforced for this user.
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;
            return Ok(());
        }

        let roots = vec![
            GamePath::new(&locked, "Locked", LauncherKind::Other),
            GamePath::new(&open, "Open", LauncherKind::Other),
        ];
        let outcome = discovery().discover(&roots);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;

        assert_eq!(outcome.failed_roots, vec![locked]);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].title, "Celeste");
        Ok(())
    }
}
