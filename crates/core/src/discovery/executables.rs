use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::warn;

/// Executable names that are never the game itself.
pub const IGNORED_EXECUTABLES: &[&str] = &[
    "unins000.exe",
    "uninstall.exe",
    "launcher.exe",
    "setup.exe",
    "install.exe",
    "updater.exe",
    "redist.exe",
    "vcredist.exe",
    "dotnetfx.exe",
    "directx.exe",
    "dxsetup.exe",
    "prerequisites.exe",
    "support.exe",
    "repair.exe",
    "crash_reporter.exe",
    "vc_redist.exe",
];

/// Size floor below which executables are treated as stubs.
pub const DEFAULT_MIN_EXECUTABLE_BYTES: u64 = 100 * 1024;

/// An executable that survived filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableCandidate {
    /// Full path to the executable.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
}

impl ExecutableCandidate {
    fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

/// Finds and ranks the executables of a folder.
#[derive(Debug, Clone)]
pub struct ExecutableClassifier {
    min_bytes: u64,
}

impl Default for ExecutableClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_EXECUTABLE_BYTES)
    }
}

impl ExecutableClassifier {
    /// Classifier with a custom size floor.
    pub fn new(min_bytes: u64) -> Self {
        Self { min_bytes }
    }

    /// Executables directly inside `folder`, minus ignored names and stubs, sorted by name.
    pub fn classify(&self, folder: &Path) -> Vec<ExecutableCandidate> {
        let entries = match fs::read_dir(folder) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(folder = %folder.display(), %err, "Unable to list executables");
                return Vec::new();
            }
        };

        let mut candidates: Vec<_> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_executable_name(path))
            .filter(|path| !is_ignored(path))
            .filter_map(|path| {
                let metadata = fs::metadata(&path).ok()?;
                if !metadata.is_file() || metadata.len() < self.min_bytes {
                    return None;
                }
                Some(ExecutableCandidate {
                    size: metadata.len(),
                    path,
                })
            })
            .collect();

        candidates.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        candidates
    }

    /// Pick the executable most likely to be the game.
    ///
    /// Preference order: stem equal to the folder name, stem and folder name
    /// containing one another, then the largest file.
    pub fn pick_main<'a>(
        &self,
        candidates: &'a [ExecutableCandidate],
        folder: &Path,
    ) -> Option<&'a ExecutableCandidate> {
        match candidates {
            [] => return None,
            [only] => return Some(only),
            _ => {}
        }

        let folder_name = folder
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if !folder_name.is_empty() {
            if let Some(exact) = candidates.iter().find(|exe| exe.stem() == folder_name) {
                return Some(exact);
            }

            if let Some(similar) = candidates.iter().find(|exe| {
                let stem = exe.stem();
                !stem.is_empty() && (folder_name.contains(&stem) || stem.contains(&folder_name))
            }) {
                return Some(similar);
            }
        }

        candidates
            .iter()
            .fold(None, |best: Option<&ExecutableCandidate>, exe| match best {
                Some(current) if current.size >= exe.size => Some(current),
                _ => Some(exe),
            })
    }

    /// Classify `folder` and return its main executable, if any.
    pub fn main_executable(&self, folder: &Path) -> Option<ExecutableCandidate> {
        let candidates = self.classify(folder);
        self.pick_main(&candidates, folder).cloned()
    }
}

fn is_executable_name(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("exe"))
        .unwrap_or(false)
}

fn is_ignored(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
        return true;
    };
    IGNORED_EXECUTABLES
        .iter()
        .any(|ignored| ignored.eq_ignore_ascii_case(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn write_sized(path: &Path, kib: usize) -> Result<()> {
        fs::write(path, vec![0u8; kib * 1024])?;
        Ok(())
    }

    fn candidate(path: &str, size: u64) -> ExecutableCandidate {
        ExecutableCandidate {
            path: PathBuf::from(path),
            size,
        }
    }

    #[test]
    fn classify_drops_ignored_and_small_executables() -> Result<()> {
        let dir = tempdir()?;
        let folder = dir.path();
        write_sized(&folder.join("Game.exe"), 500)?;
        write_sized(&folder.join("UNINS000.EXE"), 500)?;
        write_sized(&folder.join("vc_redist.exe"), 900)?;
        write_sized(&folder.join("stub.exe"), 50)?;
        write_sized(&folder.join("data.pak"), 900)?;
        fs::create_dir_all(folder.join("folder.exe"))?;

        let candidates = ExecutableClassifier::default().classify(folder);
        let names: Vec<_> = candidates
            .iter()
            .map(|exe| exe.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["Game.exe"]);
        assert_eq!(candidates[0].size, 500 * 1024);
        Ok(())
    }

    #[test]
    fn size_floor_is_inclusive() -> Result<()> {
        let dir = tempdir()?;
        write_sized(&dir.path().join("edge.exe"), 100)?;
        assert_eq!(ExecutableClassifier::default().classify(dir.path()).len(), 1);
        assert!(ExecutableClassifier::new(100 * 1024 + 1)
            .classify(dir.path())
            .is_empty());
        Ok(())
    }

    #[test]
    fn pick_main_prefers_exact_then_similar_then_largest() {
        let classifier = ExecutableClassifier::default();
        let folder = Path::new("/games/Hades");

        let exact = [
            candidate("/games/Hades/Tool.exe", 900),
            candidate("/games/Hades/HADES.exe", 200),
        ];
        assert_eq!(
            classifier.pick_main(&exact, folder).unwrap().path,
            PathBuf::from("/games/Hades/HADES.exe")
        );

        let similar = [
            candidate("/games/Hades/Tool.exe", 900),
            candidate("/games/Hades/HadesGame.exe", 200),
        ];
        assert_eq!(
            classifier.pick_main(&similar, folder).unwrap().path,
            PathBuf::from("/games/Hades/HadesGame.exe")
        );

        let largest = [
            candidate("/games/Hades/tool.exe", 300),
            candidate("/games/Hades/data.exe", 900),
            candidate("/games/Hades/bench.exe", 900),
        ];
        assert_eq!(
            classifier.pick_main(&largest, folder).unwrap().path,
            PathBuf::from("/games/Hades/data.exe")
        );
    }

    #[test]
    fn pick_main_handles_empty_and_singleton() {
        let classifier = ExecutableClassifier::default();
        let folder = Path::new("/games/Anything");
        assert!(classifier.pick_main(&[], folder).is_none());

        let single = [candidate("/games/Anything/other.exe", 1)];
        assert_eq!(classifier.pick_main(&single, folder), Some(&single[0]));
    }

    #[test]
    fn main_executable_is_never_ignored_or_small() -> Result<()> {
        let dir = tempdir()?;
        let folder = dir.path().join("setup");
        fs::create_dir_all(&folder)?;
        write_sized(&folder.join("setup.exe"), 2048)?;
        write_sized(&folder.join("tiny.exe"), 10)?;
        write_sized(&folder.join("real.exe"), 300)?;

        let main = ExecutableClassifier::default()
            .main_executable(&folder)
            .expect("one qualifying executable");
        assert!(main.path.ends_with("real.exe"));
        assert!(main.size >= DEFAULT_MIN_EXECUTABLE_BYTES);
        Ok(())
    }
}
