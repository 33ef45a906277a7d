//! Display-title resolution for discovered games.
//!
//! Titles come from an ordered list of sources; the first one producing a
//! non-blank value wins and the cleaned folder name is the last resort, so a
//! title is always produced.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::{
    discovery::manifest::{ManifestMatch, ManifestReader},
    models::LauncherKind,
};

const CONFIG_EXTENSIONS: &[&str] = &["ini", "cfg", "xml"];
const CONFIG_NAME_KEYS: &[&str] = &["GameName", "Name", "Title"];
const MAX_CONFIG_BYTES: u64 = 256 * 1024;
const MAX_VERSION_SCAN_BYTES: u64 = 64 * 1024 * 1024;

/// Per alias: `Key=Value` lines, quoted `"Key" = "Value"` pairs, then `<Key>Value</Key>` tags.
static CONFIG_NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    CONFIG_NAME_KEYS
        .iter()
        .flat_map(|key| {
            let key = regex::escape(key);
            [
                format!(r#"(?m)^[ \t]*"?{key}"?[ \t]*=[ \t]*"?([^"\r\n]+?)"?[ \t]*\r?$"#),
                format!(r#""{key}"\s*=\s*"([^"]+)""#),
                format!(r"<{key}>([^<]+)</{key}>"),
            ]
        })
        .map(|pattern| Regex::new(&pattern).expect("invalid config name pattern"))
        .collect()
});
static VERSION_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*v?[\d.]+\s*$").expect("invalid version suffix regex"));
static CAMEL_BOUNDARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z])([A-Z])").expect("invalid camel case regex"));

/// Inputs shared by every title source.
struct TitleQuery<'a> {
    folder: &'a Path,
    executable: Option<&'a Path>,
    manifest: &'a ManifestMatch,
}

type TitleSource = fn(&TitleQuery<'_>) -> Result<Option<String>>;

const TITLE_SOURCES: &[(&str, TitleSource)] = &[
    ("manifest", manifest_title),
    ("config", config_title),
    ("version", version_resource_title),
];

/// Best-effort canonical title resolution.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver;

impl IdentityResolver {
    /// Create a resolver.
    pub fn new() -> Self {
        Self
    }

    /// Resolve the display title of a game folder. Never fails and never returns blank.
    ///
    /// Steam folders consult their library manifests first.
    pub fn resolve_title(
        &self,
        folder: &Path,
        executable: Option<&Path>,
        launcher: LauncherKind,
    ) -> String {
        let manifest = match launcher {
            LauncherKind::Steam => ManifestReader::resolve_from_manifests(folder),
            _ => ManifestMatch::default(),
        };
        self.resolve_with_manifest(folder, executable, &manifest)
    }

    /// Same as [`IdentityResolver::resolve_title`] with an already resolved manifest match.
    pub fn resolve_with_manifest(
        &self,
        folder: &Path,
        executable: Option<&Path>,
        manifest: &ManifestMatch,
    ) -> String {
        let query = TitleQuery {
            folder,
            executable,
            manifest,
        };

        for (label, source) in TITLE_SOURCES {
            match source(&query) {
                Ok(Some(title)) if !title.trim().is_empty() => {
                    debug!(folder = %folder.display(), source = *label, %title, "Resolved title");
                    return title.trim().to_string();
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(folder = %folder.display(), source = *label, ?err, "Title source failed");
                }
            }
        }

        clean_folder_name(folder)
    }
}

fn manifest_title(query: &TitleQuery<'_>) -> Result<Option<String>> {
    Ok(query.manifest.name.clone())
}

fn config_title(query: &TitleQuery<'_>) -> Result<Option<String>> {
    let entries = fs::read_dir(query.folder)
        .with_context(|| format!("failed to list {}", query.folder.display()))?;

    // Every .ini before any .cfg, then .xml; by name within an extension.
    let mut files: Vec<(usize, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter_map(|path| {
            let ext = path.extension()?;
            let rank = CONFIG_EXTENSIONS
                .iter()
                .position(|known| ext.eq_ignore_ascii_case(known))?;
            Some((rank, path))
        })
        .filter(|(_, path)| {
            fs::metadata(path)
                .map(|meta| meta.is_file() && meta.len() <= MAX_CONFIG_BYTES)
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    for (_, file) in files {
        let Ok(bytes) = fs::read(&file) else {
            continue;
        };
        let content = String::from_utf8_lossy(&bytes);
        if let Some(name) = find_config_name(&content) {
            return Ok(Some(name));
        }
    }

    Ok(None)
}

fn find_config_name(content: &str) -> Option<String> {
    CONFIG_NAME_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .find(|value| !value.is_empty())
    })
}

fn version_resource_title(query: &TitleQuery<'_>) -> Result<Option<String>> {
    let Some(executable) = query.executable else {
        return Ok(None);
    };
    let size = fs::metadata(executable)
        .with_context(|| format!("failed to stat {}", executable.display()))?
        .len();
    if size > MAX_VERSION_SCAN_BYTES {
        return Ok(None);
    }

    let bytes =
        fs::read(executable).with_context(|| format!("failed to read {}", executable.display()))?;
    Ok(product_name_from_version_resource(&bytes))
}

/// Extract the `ProductName` string from a PE version resource.
///
/// The resource stores keys and values as NUL-terminated UTF-16LE, with the
/// value following its key after 32-bit alignment padding.
pub fn product_name_from_version_resource(bytes: &[u8]) -> Option<String> {
    let key: Vec<u8> = "ProductName\0"
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect();

    let mut offset = 0;
    while let Some(found) = find_subslice(&bytes[offset..], &key) {
        let mut cursor = offset + found + key.len();
        while cursor + 1 < bytes.len() && bytes[cursor] == 0 && bytes[cursor + 1] == 0 {
            cursor += 2;
        }

        let mut units = Vec::new();
        while cursor + 1 < bytes.len() && units.len() < 256 {
            let unit = u16::from_le_bytes([bytes[cursor], bytes[cursor + 1]]);
            if unit == 0 {
                break;
            }
            units.push(unit);
            cursor += 2;
        }

        if let Ok(value) = String::from_utf16(&units) {
            let value = value.trim();
            if !value.is_empty() && !value.chars().any(char::is_control) {
                return Some(value.to_string());
            }
        }
        offset += found + key.len();
    }

    None
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Turn a folder name into a readable title: separators become spaces, a
/// trailing version is dropped, and camel case is split.
pub fn clean_folder_name(folder: &Path) -> String {
    let raw = folder
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| folder.display().to_string());

    let spaced = raw.replace(['_', '-'], " ");
    let unversioned = VERSION_SUFFIX_RE.replace(&spaced, "");
    let split = CAMEL_BOUNDARY_RE.replace_all(&unversioned, "$1 $2");
    let cleaned = split.split_whitespace().collect::<Vec<_>>().join(" ");

    if cleaned.is_empty() {
        raw.trim().to_string()
    } else {
        cleaned
    }
}
