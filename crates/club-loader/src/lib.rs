//! Club Loader Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Idempotent batch loading of club analytics data (ticket sales, dues
//! payments, ...) into PostgreSQL.
//!
//! # Overview
//!
//! Each load lands its rows in a private staging table with `COPY`, then
//! merges them into the destination with `INSERT ... ON CONFLICT DO UPDATE`.
//! Loading the same batch twice leaves the destination exactly as loading it
//! once did.
//!
//! - **Staging**: per-load `TEMP` tables mirroring the destination ([`staging`])
//! - **Transfer**: bulk copy of a CSV file or an in-memory [`DataTable`] ([`transfer`])
//! - **Upsert**: transactional merge keyed on one column ([`upsert`])
//! - **Orchestration**: [`BatchLoader::batch_load`] and daily [`LoadPlan`]s
//!
//! # Example
//!
//! ```no_run
//! use club_loader::{BatchLoader, LoadRequest, LoadSource, LoaderConfig, TableRef};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let loader = BatchLoader::connect(&LoaderConfig::load()?).await?;
//!
//! let request = LoadRequest::new(
//!     LoadSource::file("data/raw/tickets_20240115.csv"),
//!     TableRef::new("raw", "entrada"),
//!     "identrada",
//! );
//!
//! let result = loader.batch_load(&request).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod plan;
pub mod request;
pub mod result;
pub mod schema;
pub mod source;
pub mod staging;
pub mod transfer;
pub mod upsert;

pub use cli::{Cli, Commands};
pub use config::LoaderConfig;
pub use error::{LoadError, LoadErrorKind, LoadOutcome};
pub use loader::BatchLoader;
pub use plan::{JobOutcome, LoadJob, LoadPlan, PlanReport, PlannedLoad};
pub use request::{LoadRequest, UpdateColumns};
pub use result::{LoadFailure, LoadResult};
pub use schema::TableRef;
pub use source::{DataTable, FileSource, LoadSource, TableError};
pub use upsert::UpsertStats;
