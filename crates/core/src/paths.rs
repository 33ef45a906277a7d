//! Registered scan roots.
//!
//! The registry is read in full when loaded and rewritten in full after every
//! mutation. Mutations hold the write lock across the disk write and only
//! publish the new list once it has been persisted, so readers never observe
//! a change that failed to reach disk.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::{
    error::RegistryError,
    models::{GamePath, LauncherKind},
    persist,
};

/// Durable list of user-designated scan roots.
pub struct PathRegistry {
    file: PathBuf,
    paths: RwLock<Vec<GamePath>>,
}

impl PathRegistry {
    /// Load the registry stored at `file`.
    ///
    /// A missing file is created empty. A corrupt file is reported and treated
    /// as empty; it is only overwritten by the next mutation.
    pub fn load(file: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let file = file.into();
        let paths = match persist::read_json::<Vec<GamePath>>(&file) {
            Ok(Some(paths)) => {
                info!(count = paths.len(), file = %file.display(), "Loaded registered paths");
                paths
            }
            Ok(None) => {
                info!(file = %file.display(), "No registered paths yet, creating registry");
                persist::write_json_atomic(&file, &Vec::<GamePath>::new())?;
                Vec::new()
            }
            Err(err) => {
                warn!(?err, file = %file.display(), "Registered paths unreadable, starting empty");
                Vec::new()
            }
        };

        Ok(Self {
            file,
            paths: RwLock::new(paths),
        })
    }

    /// Registry file on disk.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Snapshot of every registered root, active or not.
    pub fn paths(&self) -> Vec<GamePath> {
        self.paths.read().clone()
    }

    /// Snapshot of the roots the scanner should walk.
    pub fn active_paths(&self) -> Vec<GamePath> {
        self.paths
            .read()
            .iter()
            .filter(|entry| entry.is_active)
            .cloned()
            .collect()
    }

    /// Number of registered roots, active or not.
    pub fn len(&self) -> usize {
        self.paths.read().len()
    }

    /// Whether no roots are registered at all.
    pub fn is_empty(&self) -> bool {
        self.paths.read().is_empty()
    }

    /// Look up a root by id.
    pub fn get(&self, id: &str) -> Option<GamePath> {
        self.paths.read().iter().find(|entry| entry.id == id).cloned()
    }

    /// Register a root.
    ///
    /// Registering a path that is already present (compared case-insensitively)
    /// updates its name and launcher and reactivates it instead of adding a duplicate.
    pub fn add(
        &self,
        path: impl AsRef<Path>,
        name: impl Into<String>,
        launcher: LauncherKind,
    ) -> Result<GamePath, RegistryError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(RegistryError::NotADirectory(path.to_path_buf()));
        }
        let name = name.into();

        self.mutate(|paths| {
            if let Some(existing) = paths
                .iter_mut()
                .find(|entry| same_path(&entry.path, path))
            {
                existing.name = name;
                existing.launcher_type = launcher;
                existing.is_active = true;
                return Ok(existing.clone());
            }

            let entry = GamePath::new(path, name, launcher);
            paths.push(entry.clone());
            Ok(entry)
        })
    }

    /// Remove a root by id.
    pub fn remove(&self, id: &str) -> Result<GamePath, RegistryError> {
        self.mutate(|paths| {
            let index = paths
                .iter()
                .position(|entry| entry.id == id)
                .ok_or_else(|| RegistryError::UnknownPath(id.to_string()))?;
            Ok(paths.remove(index))
        })
    }

    /// Enable or disable scanning of a root without forgetting it.
    pub fn set_active(&self, id: &str, active: bool) -> Result<GamePath, RegistryError> {
        self.update(id, |entry| entry.is_active = active)
    }

    /// Change the display name of a root.
    pub fn rename(&self, id: &str, name: impl Into<String>) -> Result<GamePath, RegistryError> {
        let name = name.into();
        self.update(id, move |entry| entry.name = name)
    }

    fn update(
        &self,
        id: &str,
        change: impl FnOnce(&mut GamePath),
    ) -> Result<GamePath, RegistryError> {
        self.mutate(|paths| {
            let entry = paths
                .iter_mut()
                .find(|entry| entry.id == id)
                .ok_or_else(|| RegistryError::UnknownPath(id.to_string()))?;
            change(entry);
            Ok(entry.clone())
        })
    }

    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Vec<GamePath>) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut guard = self.paths.write();
        let mut next = guard.clone();
        let outcome = change(&mut next)?;
        persist::write_json_atomic(&self.file, &next)?;
        *guard = next;
        Ok(outcome)
    }
}

fn same_path(left: &Path, right: &Path) -> bool {
    left.to_string_lossy()
        .trim_end_matches(['/', '\\'])
        .eq_ignore_ascii_case(right.to_string_lossy().trim_end_matches(['/', '\\']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn add_and_remove_round_trip_through_disk() -> Result<()> {
        let dir = tempdir()?;
        let games = dir.path().join("Games");
        fs::create_dir_all(&games)?;
        let file = dir.path().join("paths.json");

        let registry = PathRegistry::load(&file)?;
        assert!(file.exists(), "loading creates the registry file");
        assert!(registry.is_empty());

        let entry = registry.add(&games, "Games", LauncherKind::Steam)?;
        let reloaded = PathRegistry::load(&file)?;
        assert_eq!(reloaded.paths(), vec![entry.clone()]);

        let removed = registry.remove(&entry.id)?;
        assert_eq!(removed.id, entry.id);
        assert!(PathRegistry::load(&file)?.is_empty());
        Ok(())
    }

    #[test]
    fn re_adding_a_path_reactivates_instead_of_duplicating() -> Result<()> {
        let dir = tempdir()?;
        let games = dir.path().join("Games");
        fs::create_dir_all(&games)?;
        let registry = PathRegistry::load(dir.path().join("paths.json"))?;

        let first = registry.add(&games, "Games", LauncherKind::Other)?;
        registry.set_active(&first.id, false)?;
        assert!(registry.active_paths().is_empty());

        let second = registry.add(&games, "Epic Library", LauncherKind::Epic)?;
        assert_eq!(second.id, first.id);
        assert_eq!(registry.len(), 1);
        assert_eq!(second.name, "Epic Library");
        assert_eq!(second.launcher_type, LauncherKind::Epic);
        assert!(second.is_active);
        Ok(())
    }

    #[test]
    fn rejects_missing_directories_and_unknown_ids() -> Result<()> {
        let dir = tempdir()?;
        let registry = PathRegistry::load(dir.path().join("paths.json"))?;

        let missing = registry.add(dir.path().join("nope"), "Nope", LauncherKind::Other);
        assert!(matches!(missing, Err(RegistryError::NotADirectory(_))));
        assert!(matches!(
            registry.remove("unknown"),
            Err(RegistryError::UnknownPath(_))
        ));
        assert!(matches!(
            registry.rename("unknown", "x"),
            Err(RegistryError::UnknownPath(_))
        ));
        Ok(())
    }

    #[test]
    fn corrupt_registry_loads_empty_without_overwriting() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("paths.json");
        fs::write(&file, "{ not json")?;

        let registry = PathRegistry::load(&file)?;
        assert!(registry.is_empty());
        assert_eq!(fs::read_to_string(&file)?, "{ not json");
        Ok(())
    }
}
