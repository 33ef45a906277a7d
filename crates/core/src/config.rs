//! Application configuration.
//!
//! Values are layered with the `config` crate: built-in defaults, then
//! `<config_dir>/gamecenter/config.toml`, then `GAMECENTER_*` environment
//! variables. Components receive the resolved [`AppConfig`] at construction.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Directory under the platform config/data roots owned by the application.
pub const APP_DIR: &str = "gamecenter";

const CONFIG_FILE: &str = "config.toml";

const DEFAULT_CONFIG: &str = r#"# gamecenter configuration
#
# Every key is optional; omitted keys use the built-in defaults.
# Environment variables prefixed with GAMECENTER_ override this file,
# e.g. GAMECENTER_REQUEST_TIMEOUT_SECS=10.

# data_root = "/path/to/gamecenter/data"
# cache_dir = "/path/to/Documents/GameCenter/Steam"
# fallback_cache_dir = "/path/to/local/GameCenter/SteamCache"
store_api_url = "https://store.steampowered.com/api/appdetails"
request_timeout_secs = 30
max_screenshots = 5
min_executable_bytes = 102400
"#;

/// Resolved configuration for the scanner, the metadata cache, and the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `paths.json`, `games.json`, and logs.
    pub data_root: PathBuf,
    /// Preferred metadata cache directory.
    pub cache_dir: PathBuf,
    /// Cache directory used when the preferred one is not writable.
    pub fallback_cache_dir: PathBuf,
    /// Store endpoint queried with `?appids=<id>`.
    pub store_api_url: String,
    /// Timeout applied to every store request.
    pub request_timeout_secs: u64,
    /// Maximum screenshots downloaded per application id.
    pub max_screenshots: usize,
    /// Executables smaller than this are never considered the main game binary.
    pub min_executable_bytes: u64,
    /// Canary directory created and listed by the access check.
    pub access_probe_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_root = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        let cache_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("GameCenter")
            .join("Steam");
        let fallback_cache_dir = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("GameCenter")
            .join("SteamCache");

        Self {
            data_root,
            cache_dir,
            fallback_cache_dir,
            store_api_url: "https://store.steampowered.com/api/appdetails".to_string(),
            request_timeout_secs: 30,
            max_screenshots: 5,
            min_executable_bytes: 100 * 1024,
            access_probe_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default config file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load configuration from a specific file (which may be absent) and the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("GAMECENTER").try_parsing(true))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// File backing the registered scan roots.
    pub fn paths_file(&self) -> PathBuf {
        self.data_root.join("paths.json")
    }

    /// File backing the persisted game records.
    pub fn games_file(&self) -> PathBuf {
        self.data_root.join("games.json")
    }

    /// File backing simple key/value user preferences.
    pub fn preferences_file(&self) -> PathBuf {
        self.data_root.join("preferences.json")
    }

    /// Directory receiving log files from front ends.
    pub fn log_dir(&self) -> PathBuf {
        self.data_root.join("logs")
    }

    /// Canary directory for the access check.
    pub fn probe_dir(&self) -> PathBuf {
        self.access_probe_dir
            .clone()
            .unwrap_or_else(|| self.data_root.join("probe"))
    }
}

/// Location of the user configuration file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}

/// Write a commented default configuration file if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    if path.exists() {
        return Ok(path);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(&dir.path().join("absent.toml"))?;
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.max_screenshots, 5);
        assert_eq!(config.min_executable_bytes, 100 * 1024);
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            format!(
                "data_root = \"{}\"\nmax_screenshots = 2\n",
                dir.path().join("data").display().to_string().replace('\\', "/")
            ),
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.max_screenshots, 2);
        assert_eq!(config.paths_file(), dir.path().join("data").join("paths.json"));
        assert_eq!(config.probe_dir(), dir.path().join("data").join("probe"));
        Ok(())
    }

    #[test]
    fn unknown_keys_are_ignored() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_key = \"stale\"\nrequest_timeout_secs = 5\n")?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.request_timeout_secs, 5);
        Ok(())
    }

    #[test]
    fn bundled_default_config_parses() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, DEFAULT_CONFIG)?;
        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.store_api_url, AppConfig::default().store_api_url);
        Ok(())
    }
}
