//! Typed errors for the places where callers branch on the failure kind.

use std::path::PathBuf;

use thiserror::Error;

/// Failure while fetching store metadata for an application id.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout, or body read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The store answered with a non-success HTTP status.
    #[error("store responded with HTTP {0}")]
    Status(u16),
    /// The payload carried `success: false` or no data for the id.
    #[error("store reported no data for app {app_id}")]
    Unsuccessful {
        /// Application id that was requested.
        app_id: u32,
    },
    /// The payload could not be decoded.
    #[error("malformed store payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failure while reading or mutating the registered scan roots.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No registered root carries the given id.
    #[error("no registered path with id {0}")]
    UnknownPath(String),
    /// The path to register is not an existing directory.
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    /// Reading or writing the registry file failed.
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}
