use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use gamecenter_core::FolderPicker;

/// Asks for a folder on the terminal when the access check fails.
pub struct StdinFolderPicker;

impl FolderPicker for StdinFolderPicker {
    fn pick_folder(&self) -> Option<PathBuf> {
        let mut stderr = io::stderr();
        let _ = write!(
            stderr,
            "Filesystem access check failed. Enter a games folder to scan (empty to skip): "
        );
        let _ = stderr.flush();

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        let line = line.trim().trim_matches('"');
        if line.is_empty() {
            return None;
        }

        let folder = PathBuf::from(line);
        if folder.is_dir() {
            Some(folder)
        } else {
            let _ = writeln!(stderr, "{} is not a directory", folder.display());
            None
        }
    }
}
