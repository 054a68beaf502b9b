//! Club Analytics Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging setup for the club analytics workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`ClubError`] and the [`Result`] alias used for
//!   configuration and file handling outside the loader core
//! - **Logging**: process-wide `tracing` subscriber initialisation for binaries
//!
//! Libraries in the workspace only emit `tracing` events. Installing a
//! subscriber is left to the binary that embeds them.
//!
//! # Example
//!
//! ```no_run
//! use club_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     info!("Loader started");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{ClubError, Result};
