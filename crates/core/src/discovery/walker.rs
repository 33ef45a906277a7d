use std::{
    collections::HashSet,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory names never treated as game folders nor descended into.
pub const EXCLUDED_FOLDERS: &[&str] = &[
    "GameSave",
    "Saves",
    "SavedGames",
    "SaveData",
    "Backups",
    "Cache",
    "Temp",
    "Logs",
    "Redistributables",
    "Redist",
    "CommonRedist",
    "__Installer",
    "_CommonRedist",
];

/// Shared flag used to stop a scan early.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A directory visited during a walk that may contain a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFolder {
    /// Directory path as reached from the root.
    pub path: PathBuf,
}

/// Whether `name` is one of the excluded folder names (case-insensitive).
pub fn is_excluded(name: &str) -> bool {
    EXCLUDED_FOLDERS
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(name))
}

/// Recursive enumerator of candidate folders below a scan root.
#[derive(Debug, Clone, Default)]
pub struct DirectoryWalker {
    cancel: CancelToken,
}

impl DirectoryWalker {
    /// Walker bound to a cancellation token.
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel }
    }

    /// Lazily walk `root`, yielding the root first and then every non-excluded
    /// subdirectory in depth-first, name-sorted order.
    ///
    /// Unreadable subtrees are logged and skipped. Directories reached twice
    /// through links or junctions are only yielded once.
    pub fn walk(&self, root: &Path) -> Walk {
        let inner = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();
        Walk {
            inner,
            visited: HashSet::new(),
            cancel: self.cancel.clone(),
        }
    }
}

/// Iterator returned by [`DirectoryWalker::walk`].
pub struct Walk {
    inner: walkdir::IntoIter,
    visited: HashSet<PathBuf>,
    cancel: CancelToken,
}

impl Iterator for Walk {
    type Item = CandidateFolder;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }

            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    if err.loop_ancestor().is_some() {
                        debug!(path = %path.display(), "Skipping directory cycle");
                    } else if err.io_error().map(|io| io.kind()) == Some(ErrorKind::PermissionDenied)
                    {
                        warn!(path = %path.display(), "Access denied, skipping subtree");
                    } else {
                        warn!(path = %path.display(), %err, "Unable to read directory, skipping subtree");
                    }
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            if entry.depth() > 0 && is_excluded(&entry.file_name().to_string_lossy()) {
                debug!(path = %entry.path().display(), "Skipping excluded folder");
                self.inner.skip_current_dir();
                continue;
            }

            let key = fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
            if !self.visited.insert(key) {
                debug!(path = %entry.path().display(), "Directory already visited");
                self.inner.skip_current_dir();
                continue;
            }

            return Some(CandidateFolder {
                path: entry.into_path(),
            });
        }
    }
}
