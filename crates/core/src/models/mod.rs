//! Shared domain models.

use std::{
    convert::Infallible,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storefront or client a scan root and its games belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LauncherKind {
    /// Valve's Steam client.
    Steam,
    /// Xbox app / Game Pass.
    Xbox,
    /// Epic Games Launcher.
    Epic,
    /// Anything else, including unrecognised tags.
    #[default]
    Other,
}

impl LauncherKind {
    /// Every launcher in bucket order.
    pub const ALL: [LauncherKind; 4] = [
        LauncherKind::Steam,
        LauncherKind::Xbox,
        LauncherKind::Epic,
        LauncherKind::Other,
    ];

    /// Canonical tag as written to disk.
    pub fn as_str(self) -> &'static str {
        match self {
            LauncherKind::Steam => "Steam",
            LauncherKind::Xbox => "Xbox",
            LauncherKind::Epic => "Epic",
            LauncherKind::Other => "Other",
        }
    }

    /// Case-insensitive parse; unknown tags fall back to [`LauncherKind::Other`].
    pub fn parse_lenient(value: &str) -> Self {
        let value = value.trim();
        LauncherKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
            .unwrap_or(LauncherKind::Other)
    }
}

impl fmt::Display for LauncherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LauncherKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl From<String> for LauncherKind {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl From<LauncherKind> for String {
    fn from(value: LauncherKind) -> Self {
        value.as_str().to_string()
    }
}

/// A user-registered root directory that is walked during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePath {
    /// Stable identifier used by remove/rename.
    pub id: String,
    /// Absolute path of the root.
    pub path: PathBuf,
    /// Display name shown in the path list.
    pub name: String,
    /// Launcher hint applied to every game found below the root.
    pub launcher_type: LauncherKind,
    /// When the root was first registered.
    pub date_added: DateTime<Utc>,
    /// Inactive roots are kept but skipped by the scanner.
    pub is_active: bool,
}

impl GamePath {
    /// Create a new active entry with a fresh identifier.
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, launcher: LauncherKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            path: path.into(),
            name: name.into(),
            launcher_type: launcher,
            date_added: Utc::now(),
            is_active: true,
        }
    }
}

/// How a game is started: a protocol URI handed to the OS, or a direct executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum LaunchTarget {
    /// Protocol string such as `steam://run/620`.
    Uri(String),
    /// Executable started directly from its folder.
    Executable(PathBuf),
}

impl LaunchTarget {
    /// Derive the launch identifier for a discovered game.
    pub fn for_game(
        launcher: LauncherKind,
        app_id: Option<u32>,
        folder: &Path,
        executable: &Path,
    ) -> Self {
        let folder_name = folder
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        match (launcher, app_id) {
            (LauncherKind::Steam, Some(app_id)) => Self::Uri(format!("steam://run/{app_id}")),
            (LauncherKind::Epic, _) if !folder_name.is_empty() => Self::Uri(format!(
                "com.epicgames.launcher://apps/{folder_name}?action=launch"
            )),
            (LauncherKind::Xbox, _) if !folder_name.is_empty() => Self::Uri(format!(
                "ms-xbox-gamepass://{}",
                folder_name.replace(' ', "")
            )),
            _ => Self::Executable(executable.to_path_buf()),
        }
    }
}

impl fmt::Display for LaunchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchTarget::Uri(uri) => f.write_str(uri),
            LaunchTarget::Executable(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Extended store metadata attached by enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDetails {
    /// First listed developer.
    pub developer: Option<String>,
    /// First listed publisher.
    pub publisher: Option<String>,
    /// Release date as reported by the store, unparsed.
    pub release_date: Option<String>,
    /// Genre descriptions.
    #[serde(default)]
    pub genres: Vec<String>,
    /// Short description.
    pub description: Option<String>,
}

/// A discovered (or sample) game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Identifier unique within the library.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Launcher bucket the record belongs to.
    pub launcher: LauncherKind,
    /// Folder the game was found in.
    pub install_location: PathBuf,
    /// Main executable chosen for the folder.
    pub executable_path: Option<PathBuf>,
    /// Launcher application id, present only when a manifest resolved one.
    pub app_id: Option<u32>,
    /// How to start the game.
    pub launch_target: LaunchTarget,
    /// Last launch, seeded from the executable's modification time.
    pub last_played: DateTime<Utc>,
    /// Cumulative play time in minutes.
    pub play_time_minutes: u64,
    /// Locally cached screenshot files.
    #[serde(default)]
    pub screenshots: Vec<PathBuf>,
    /// Locally cached header image.
    pub header_image: Option<PathBuf>,
    /// Store metadata, empty until enrichment lands.
    #[serde(default)]
    pub details: GameDetails,
    /// Set for the placeholder records shown when nothing is registered.
    #[serde(default)]
    pub is_sample: bool,
}

impl GameRecord {
    /// Whether the record is eligible for store metadata enrichment.
    pub fn is_enrichable(&self) -> bool {
        self.launcher == LauncherKind::Steam && self.app_id.is_some() && !self.is_sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launcher_tags_parse_leniently() {
        assert_eq!(LauncherKind::parse_lenient("steam"), LauncherKind::Steam);
        assert_eq!(LauncherKind::parse_lenient(" EPIC "), LauncherKind::Epic);
        assert_eq!(LauncherKind::parse_lenient("GOG"), LauncherKind::Other);

        let parsed: LauncherKind = serde_json::from_str("\"xbox\"").unwrap();
        assert_eq!(parsed, LauncherKind::Xbox);
        assert_eq!(serde_json::to_string(&LauncherKind::Xbox).unwrap(), "\"Xbox\"");
    }

    #[test]
    fn launch_targets_follow_launcher_conventions() {
        let folder = Path::new("/games/Halo Infinite");
        let exe = folder.join("HaloInfinite.exe");

        assert_eq!(
            LaunchTarget::for_game(LauncherKind::Steam, Some(620), folder, &exe).to_string(),
            "steam://run/620"
        );
        assert_eq!(
            LaunchTarget::for_game(LauncherKind::Xbox, None, folder, &exe).to_string(),
            "ms-xbox-gamepass://HaloInfinite"
        );
        assert_eq!(
            LaunchTarget::for_game(LauncherKind::Epic, None, folder, &exe).to_string(),
            "com.epicgames.launcher://apps/Halo Infinite?action=launch"
        );
        assert_eq!(
            LaunchTarget::for_game(LauncherKind::Steam, None, folder, &exe),
            LaunchTarget::Executable(exe.clone())
        );
        assert_eq!(
            LaunchTarget::for_game(LauncherKind::Other, Some(1), folder, &exe),
            LaunchTarget::Executable(exe)
        );
    }

    #[test]
    fn game_path_serialises_with_camel_case_fields() {
        let entry = GamePath::new("/games", "Games", LauncherKind::Epic);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["launcherType"], "Epic");
        assert_eq!(value["isActive"], true);
        assert!(value.get("dateAdded").is_some());
    }
}
