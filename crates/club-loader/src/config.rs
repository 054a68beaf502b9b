//! Loader configuration

use club_common::{ClubError, Result};
use serde::{Deserialize, Serialize};

use crate::db::DbConfig;

/// Schema the raw club tables live in.
pub const DEFAULT_SCHEMA: &str = "raw";

/// Environment variable overriding [`DEFAULT_SCHEMA`].
pub const ENV_SCHEMA: &str = "CLUB_LOADER_SCHEMA";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    pub database: DbConfig,
    /// Schema used when a destination is given without one
    pub default_schema: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            database: DbConfig::default(),
            default_schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

impl LoaderConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database: DbConfig::from_env(),
            default_schema: std::env::var(ENV_SCHEMA)
                .unwrap_or_else(|_| DEFAULT_SCHEMA.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(ClubError::config("Database URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(ClubError::config(
                "Database max_connections must be greater than 0",
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ClubError::config(format!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        if self.default_schema.trim().is_empty() {
            return Err(ClubError::config("Default schema cannot be empty"));
        }

        Ok(())
    }
}
