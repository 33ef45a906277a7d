#![warn(clippy::all, missing_docs)]

//! Core of the game library launcher.
//!
//! This crate discovers installed games below user-registered folders,
//! resolves their titles and launcher identities, enriches Steam titles with
//! cached store metadata, and persists the results. It has no UI; front ends
//! drive it through [`scanner::GameScanner`].

pub mod config;
pub mod discovery;
pub mod error;
pub mod launch;
pub mod library;
pub mod metadata;
pub mod models;
pub mod paths;
pub mod samples;
pub mod scanner;
pub mod store;

mod persist;

pub use config::AppConfig;
pub use error::{FetchError, RegistryError};
pub use library::GameLibrary;
pub use metadata::{EnrichmentUpdate, MetadataCache, MetadataSource, SteamStoreClient};
pub use models::{GameDetails, GamePath, GameRecord, LaunchTarget, LauncherKind};
pub use paths::PathRegistry;
pub use scanner::{AccessStatus, FolderPicker, GameScanner, ScanReport};
pub use store::{GameStore, JsonGameStore, Preferences};
