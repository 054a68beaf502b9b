//! Shared harness for club-loader integration tests
//!
//! Each test starts its own PostgreSQL container with the raw club tables
//! from `fixtures/schema.sql` already created.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestPostgres;
//!
//! #[tokio::test]
//! #[ignore = "requires Docker"]
//! async fn test_load() {
//!     let pg = TestPostgres::start().await.unwrap();
//!     let loader = pg.loader();
//!     // ...
//! }
//! ```

#![allow(dead_code)]

use anyhow::{Context, Result};
use club_loader::BatchLoader;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

const SCHEMA_SQL: &str = include_str!("../fixtures/schema.sql");

/// PostgreSQL container with the raw tables created
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
    connection_string: String,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("Failed to create fixture tables")?;

        Ok(Self {
            _container: container,
            pool,
            connection_string,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Loader sharing this container's pool
    pub fn loader(&self) -> BatchLoader {
        BatchLoader::new(self.pool.clone())
    }

    pub async fn count(&self, table: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count rows in {}", table))?;
        Ok(count)
    }

    /// Temp tables still alive in any session whose name starts with `prefix`
    pub async fn staging_tables(&self, prefix: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pg_class WHERE relpersistence = 't' AND relname LIKE $1",
        )
        .bind(format!("{}\\_staging\\_%", prefix))
        .fetch_one(&self.pool)
        .await
        .context("Failed to list staging tables")?;
        Ok(count)
    }

    /// `(identrada, idsocio, precio)` ordered by key
    pub async fn tickets(&self) -> Result<Vec<(String, Option<i32>, Option<i32>)>> {
        let rows = sqlx::query_as(
            "SELECT identrada, idsocio, precio FROM raw.entrada ORDER BY identrada",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to read raw.entrada")?;
        Ok(rows)
    }

    /// `(idcuota, idsocio, precio, estado)` ordered by key
    pub async fn dues(&self) -> Result<Vec<(String, i32, i32, i32)>> {
        let rows = sqlx::query_as(
            "SELECT idcuota, idsocio, precio, estado FROM raw.cuota ORDER BY idcuota",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to read raw.cuota")?;
        Ok(rows)
    }
}

/// Write a fixture file and return its path
pub fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("Failed to write fixture CSV");
    path
}

/// Initialize tracing for tests
///
/// Call at the start of a test to see loader logs. Safe to call repeatedly.
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,club_loader=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}
