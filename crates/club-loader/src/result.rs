//! Outcome report of one `batch_load` call

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadErrorKind};
use crate::upsert::UpsertStats;

/// Why a load failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFailure {
    pub kind: LoadErrorKind,
    pub message: String,
}

impl From<&LoadError> for LoadFailure {
    fn from(err: &LoadError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Immutable report produced once per load
///
/// Row counts reached before a failure are kept, so a failed merge still
/// reports how many rows made it into staging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadResult {
    success: bool,
    source: String,
    destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows_loaded: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows_processed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows_merged: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_rows_in_destination: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<LoadFailure>,
    timestamp: DateTime<Utc>,
    duration_ms: u64,
}

/// Counters gathered while a load runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LoadProgress {
    pub rows_loaded: Option<u64>,
    pub upsert: Option<UpsertStats>,
}

impl LoadResult {
    pub(crate) fn new(
        source: String,
        destination: String,
        progress: LoadProgress,
        error: Option<&LoadError>,
        duration_ms: u64,
    ) -> Self {
        Self {
            success: error.is_none(),
            source,
            destination,
            rows_loaded: progress.rows_loaded,
            rows_processed: progress.upsert.map(|s| s.rows_processed),
            rows_merged: progress.upsert.map(|s| s.rows_merged),
            total_rows_in_destination: progress.upsert.map(|s| s.total_rows_in_destination),
            error: error.map(LoadFailure::from),
            timestamp: Utc::now(),
            duration_ms,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Source identifier (file path or in-memory description)
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Destination as `schema.table`
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Rows landed in staging
    pub fn rows_loaded(&self) -> Option<u64> {
        self.rows_loaded
    }

    pub fn rows_processed(&self) -> Option<u64> {
        self.rows_processed
    }

    pub fn rows_merged(&self) -> Option<u64> {
        self.rows_merged
    }

    pub fn total_rows_in_destination(&self) -> Option<u64> {
        self.total_rows_in_destination
    }

    pub fn error(&self) -> Option<&LoadFailure> {
        self.error.as_ref()
    }

    pub fn error_kind(&self) -> Option<LoadErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}
