//! Error types for the batch loader
//!
//! Every failure a load can hit maps to one [`LoadError`] variant. The
//! orchestrator converts them into a failed [`LoadResult`](crate::LoadResult),
//! so callers of `batch_load` never see these directly unless they drive the
//! individual steps themselves.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for loader operations
pub type LoadOutcome<T> = std::result::Result<T, LoadError>;

/// Failure raised by one of the load steps
#[derive(Error, Debug)]
pub enum LoadError {
    /// Input file does not exist
    #[error("Source file not found: '{}'", .0.display())]
    SourceNotFound(PathBuf),

    /// Destination table or its columns could not be resolved
    #[error("Cannot resolve destination {table}: {reason}")]
    SchemaResolution { table: String, reason: String },

    /// Bulk copy into staging failed and was rolled back
    #[error("Bulk transfer from {origin} into staging failed: {reason}")]
    Transfer { origin: String, reason: String },

    /// Merge from staging into the destination failed and was rolled back
    #[error("Upsert into {table} failed: {source}")]
    Upsert {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// No usable database session
    #[error("Database connection failed: {0}")]
    Connection(#[from] sqlx::Error),
}

impl LoadError {
    pub fn schema(table: impl ToString, reason: impl Into<String>) -> Self {
        Self::SchemaResolution {
            table: table.to_string(),
            reason: reason.into(),
        }
    }

    pub fn transfer(origin: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transfer {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    pub fn upsert(table: impl ToString, source: sqlx::Error) -> Self {
        Self::Upsert {
            table: table.to_string(),
            source,
        }
    }

    /// Machine-readable category of this error
    pub fn kind(&self) -> LoadErrorKind {
        match self {
            LoadError::SourceNotFound(_) => LoadErrorKind::SourceNotFound,
            LoadError::SchemaResolution { .. } => LoadErrorKind::SchemaResolution,
            LoadError::Transfer { .. } => LoadErrorKind::Transfer,
            LoadError::Upsert { .. } => LoadErrorKind::Upsert,
            LoadError::Connection(_) => LoadErrorKind::Connection,
        }
    }
}

/// Error category reported in a failed [`LoadResult`](crate::LoadResult)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadErrorKind {
    SourceNotFound,
    SchemaResolution,
    Transfer,
    Upsert,
    Connection,
}

impl std::fmt::Display for LoadErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoadErrorKind::SourceNotFound => "source_not_found",
            LoadErrorKind::SchemaResolution => "schema_resolution",
            LoadErrorKind::Transfer => "transfer",
            LoadErrorKind::Upsert => "upsert",
            LoadErrorKind::Connection => "connection",
        };
        f.write_str(name)
    }
}
