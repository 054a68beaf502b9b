//! Per-load staging tables
//!
//! A staging table is a `TEMP` table created with `LIKE <destination>`, so it
//! has the destination's column names, types and order but none of its rows.
//! Temp tables belong to the session that created them, so [`StagingArea`]
//! owns that session's pooled connection for the whole load.
//!
//! Release is guaranteed on every path: [`StagingArea::release`] drops the
//! table explicitly, and a handle dropped without it (early return, panic)
//! closes its connection instead of returning it to the pool, which ends the
//! session and takes the temp table with it.

use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, Postgres};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{LoadError, LoadOutcome};
use crate::schema::{quote_ident, resolve_columns, ColumnInfo, TableRef};

/// PostgreSQL truncates identifiers longer than this many bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Handle to one load's staging table and the session it lives in
pub struct StagingArea {
    name: String,
    destination: TableRef,
    columns: Vec<ColumnInfo>,
    loaded_columns: Option<Vec<String>>,
    conn: PoolConnection<Postgres>,
    released: bool,
}

impl StagingArea {
    /// Create a staging table mirroring `destination`
    ///
    /// Fails with a schema resolution error when the destination is missing
    /// or its metadata cannot be read.
    #[instrument(skip_all, fields(destination = %destination))]
    pub async fn create(
        mut conn: PoolConnection<Postgres>,
        destination: &TableRef,
    ) -> LoadOutcome<Self> {
        let columns = resolve_columns(&mut conn, destination).await?;
        let name = staging_name(&destination.table, Utc::now());

        let create_sql = format!(
            "CREATE TEMP TABLE {} (LIKE {} INCLUDING DEFAULTS)",
            quote_ident(&name),
            destination.quoted()
        );

        sqlx::query(&create_sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                LoadError::schema(destination, format!("failed to create staging table: {}", e))
            })?;

        info!(staging = %name, columns = columns.len(), "Created staging table");

        Ok(Self {
            name,
            destination: destination.clone(),
            columns,
            loaded_columns: None,
            conn,
            released: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Quoted name for use in SQL
    pub fn quoted_name(&self) -> String {
        quote_ident(&self.name)
    }

    pub fn destination(&self) -> &TableRef {
        &self.destination
    }

    /// Destination columns captured when the staging table was created
    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Columns filled by the last transfer, `None` before any
    ///
    /// Every other staging column holds its default.
    pub fn loaded_columns(&self) -> Option<&[String]> {
        self.loaded_columns.as_deref()
    }

    pub(crate) fn set_loaded_columns(&mut self, columns: Vec<String>) {
        self.loaded_columns = Some(columns);
    }

    /// The session owning the staging table
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Drop the staging table and hand the connection back to the pool
    ///
    /// If the drop itself fails the connection is closed rather than reused.
    #[instrument(skip_all, fields(staging = %self.name))]
    pub async fn release(mut self) -> Result<(), sqlx::Error> {
        let drop_sql = format!("DROP TABLE IF EXISTS {}", self.quoted_name());
        let outcome = sqlx::query(&drop_sql)
            .execute(&mut *self.conn)
            .await
            .map(|_| ());

        match &outcome {
            Ok(()) => debug!("Dropped staging table"),
            Err(e) => {
                warn!(error = %e, "Failed to drop staging table, closing its session");
                self.conn.close_on_drop();
            },
        }

        self.released = true;
        outcome
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                staging = %self.name,
                "Staging table dropped without release, closing its session"
            );
            self.conn.close_on_drop();
        }
    }
}

impl std::fmt::Debug for StagingArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingArea")
            .field("name", &self.name)
            .field("destination", &self.destination)
            .field("columns", &self.columns.len())
            .field("loaded_columns", &self.loaded_columns)
            .field("released", &self.released)
            .finish()
    }
}

/// `<table>_staging_<yyyymmddHHMMSS>_<8 hex>`, cut to fit an identifier
///
/// The random part keeps concurrent loads of the same table apart even
/// within the same second.
pub fn staging_name(table: &str, now: DateTime<Utc>) -> String {
    let token = Uuid::new_v4().simple().to_string();
    let suffix = format!(
        "_staging_{}_{}",
        now.format("%Y%m%d%H%M%S"),
        token.get(..8).unwrap_or(&token)
    );

    let mut end = table.len().min(MAX_IDENTIFIER_LEN.saturating_sub(suffix.len()));
    while !table.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}{}", &table[..end], suffix)
}
