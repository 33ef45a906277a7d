//! Steam `appmanifest_<id>.acf` lookups.
//!
//! Manifests are line-oriented `"key"		"value"` text. Only the `installdir`,
//! `appid`, and `name` keys are read, by pattern search rather than a full
//! KeyValues parser.

use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static INSTALL_DIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?im)^\s*"installdir"\s+"([^"]*)""#).expect("invalid installdir regex")
});
static APP_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?im)^\s*"appid"\s+"(\d+)""#).expect("invalid appid regex"));
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?im)^\s*"name"\s+"([^"]+)""#).expect("invalid name regex"));
static MANIFEST_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^appmanifest_(\d+)\.acf$").expect("invalid manifest filename regex")
});

/// Identity facts recovered from a launcher manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestMatch {
    /// Numeric application id.
    pub app_id: Option<u32>,
    /// Canonical display name.
    pub name: Option<String>,
}

impl ManifestMatch {
    /// Whether nothing was resolved.
    pub fn is_empty(&self) -> bool {
        self.app_id.is_none() && self.name.is_none()
    }
}

/// Resolves install folders to launcher identities through manifest files.
pub struct ManifestReader;

impl ManifestReader {
    /// The `steamapps` directory of the library containing `install_path`.
    ///
    /// Present only when an ancestor of `install_path` is `steamapps/common`.
    pub fn library_root(install_path: &Path) -> Option<PathBuf> {
        install_path
            .ancestors()
            .skip(1)
            .find(|ancestor| {
                is_named(ancestor, "common")
                    && ancestor
                        .parent()
                        .map(|parent| is_named(parent, "steamapps"))
                        .unwrap_or(false)
            })
            .and_then(Path::parent)
            .map(Path::to_path_buf)
    }

    /// Resolve the application id and name for the game installed at `install_path`.
    ///
    /// Returns an empty match when the path is not inside a launcher library or
    /// no manifest names the folder. The first manifest whose `installdir`
    /// equals the folder name (case-insensitive) wins; its id comes from the
    /// `appid` field, or from the manifest's filename when that field is absent.
    pub fn resolve_from_manifests(install_path: &Path) -> ManifestMatch {
        let Some(library) = Self::library_root(install_path) else {
            debug!(path = %install_path.display(), "Not inside a Steam library");
            return ManifestMatch::default();
        };
        let Some(folder_name) = install_path.file_name().map(OsStr::to_string_lossy) else {
            return ManifestMatch::default();
        };

        for (manifest, file_id) in manifest_files(&library) {
            let content = match fs::read_to_string(&manifest) {
                Ok(content) => content,
                Err(err) => {
                    warn!(manifest = %manifest.display(), %err, "Unable to read manifest");
                    continue;
                }
            };

            let Some(install_dir) = capture(&INSTALL_DIR_RE, &content) else {
                debug!(manifest = %manifest.display(), "Manifest has no installdir");
                continue;
            };
            if !install_dir.eq_ignore_ascii_case(&folder_name) {
                continue;
            }

            let app_id = capture(&APP_ID_RE, &content)
                .and_then(|value| value.parse().ok())
                .or(file_id);
            let name = capture(&NAME_RE, &content)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
            debug!(manifest = %manifest.display(), ?app_id, ?name, "Matched manifest");
            return ManifestMatch { app_id, name };
        }

        ManifestMatch::default()
    }
}

fn is_named(path: &Path, expected: &str) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

fn capture(re: &Regex, content: &str) -> Option<String> {
    re.captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Manifest files in `library`, name-sorted, with the id encoded in each filename.
fn manifest_files(library: &Path) -> Vec<(PathBuf, Option<u32>)> {
    let entries = match fs::read_dir(library) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(library = %library.display(), %err, "Unable to list manifests");
            return Vec::new();
        }
    };

    let mut manifests: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let caps = MANIFEST_FILE_RE.captures(&name)?;
            let id = caps.get(1).and_then(|m| m.as_str().parse().ok());
            Some((entry.path(), id))
        })
        .filter(|(path, _)| path.is_file())
        .collect();
    manifests.sort_by(|a, b| a.0.cmp(&b.0));
    manifests
}
