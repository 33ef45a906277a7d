//! JSON file helpers shared by the registry, the game store, and the metadata cache.

use std::{fs, io::Write, path::Path};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

/// Read and decode a JSON file, returning `None` if it does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents =
        fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_slice(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(value))
}

/// Replace `path` with the serialised value.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let serialised = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialise {}", path.display()))?;
    write_bytes_atomic(path, &serialised)
}

/// Replace `path` with `bytes`.
///
/// The payload goes to a temporary file in the same directory which is then renamed
/// over the target, so readers see either the old or the new contents.
pub(crate) fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let mut staged = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to stage a write in {}", parent.display()))?;
    staged
        .write_all(bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    staged.as_file().sync_all()?;
    staged
        .persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
