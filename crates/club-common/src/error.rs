//! Error types shared across the workspace

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, ClubError>;

/// Errors raised while reading configuration and auxiliary files
#[derive(Error, Debug)]
pub enum ClubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: '{}'", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid TOML in '{}': {message}", .path.display())]
    Toml { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClubError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Wrap a TOML parse failure with the file it came from
    pub fn toml(path: &Path, err: toml::de::Error) -> Self {
        Self::Toml {
            path: path.to_path_buf(),
            message: err.message().to_string(),
        }
    }
}

/// Read a TOML document from disk into `T`
pub fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ClubError::FileNotFound(path.to_path_buf()),
        _ => ClubError::Io(e),
    })?;

    toml::from_str(&raw).map_err(|e| ClubError::toml(path, e))
}
