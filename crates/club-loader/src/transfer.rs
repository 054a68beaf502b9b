//! Bulk transfer of source rows into a staging table
//!
//! Both source kinds go through `COPY ... FROM STDIN` inside one transaction
//! that starts by truncating the staging table. A failure anywhere rolls the
//! whole transaction back, so staging never holds a partial batch.

use sqlx::Connection;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument};

use crate::error::{LoadError, LoadOutcome};
use crate::schema::{column_list, quote_literal, ColumnInfo};
use crate::source::{DataTable, FileSource, LoadSource};
use crate::staging::StagingArea;

/// Bytes sent to the server per `CopyData` message.
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

enum CopyBody<'a> {
    File(tokio::fs::File),
    Bytes(&'a [u8]),
}

/// Copy `source` into `staging`, replacing whatever it held
///
/// Returns the number of data rows landed, header excluded.
#[instrument(skip_all, fields(staging = %staging.name(), source = %source.identifier()))]
pub async fn load_into_staging(source: &LoadSource, staging: &mut StagingArea) -> LoadOutcome<u64> {
    let origin = source.identifier();

    let rows = match source {
        LoadSource::File(file) => copy_file(file, staging, &origin).await?,
        LoadSource::Table(table) => copy_table(table, staging, &origin).await?,
    };

    info!(rows, "Loaded rows into staging");
    Ok(rows)
}

async fn copy_file(file: &FileSource, staging: &mut StagingArea, origin: &str) -> LoadOutcome<u64> {
    if !file.exists() {
        return Err(LoadError::SourceNotFound(file.path.clone()));
    }

    let header = file
        .read_header()
        .map_err(|e| LoadError::transfer(origin, e))?;
    check_columns(&header, staging.columns(), origin)?;

    let copy_sql = format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, HEADER true, DELIMITER {})",
        staging.quoted_name(),
        column_list(&header),
        quote_literal(&char::from(file.delimiter).to_string())
    );

    let handle = tokio::fs::File::open(&file.path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LoadError::SourceNotFound(file.path.clone()),
        _ => LoadError::transfer(origin, e),
    })?;

    let rows = copy_into(staging, origin, &copy_sql, CopyBody::File(handle)).await?;
    staging.set_loaded_columns(header);
    Ok(rows)
}

async fn copy_table(table: &DataTable, staging: &mut StagingArea, origin: &str) -> LoadOutcome<u64> {
    check_columns(table.columns(), staging.columns(), origin)?;

    let copy_sql = format!(
        "COPY {} ({}) FROM STDIN",
        staging.quoted_name(),
        column_list(table.columns())
    );
    let body = table.to_copy_text();

    let rows = copy_into(staging, origin, &copy_sql, CopyBody::Bytes(body.as_bytes())).await?;
    staging.set_loaded_columns(table.columns().to_vec());
    Ok(rows)
}

/// Column names the source provides: the file header or the table's columns
///
/// Read before any data moves; a missing file is reported as such.
pub fn source_columns(source: &LoadSource) -> LoadOutcome<Vec<String>> {
    match source {
        LoadSource::File(file) => {
            if !file.exists() {
                return Err(LoadError::SourceNotFound(file.path.clone()));
            }
            file.read_header()
                .map_err(|e| LoadError::transfer(source.identifier(), e))
        },
        LoadSource::Table(table) => Ok(table.columns().to_vec()),
    }
}

/// Fail unless the source provides `column`, typically the conflict key
///
/// Returns the source's columns on success.
pub fn require_source_column(source: &LoadSource, column: &str) -> LoadOutcome<Vec<String>> {
    let columns = source_columns(source)?;

    if columns.iter().any(|name| name == column) {
        Ok(columns)
    } else {
        Err(LoadError::transfer(
            source.identifier(),
            format!("source has no '{}' column", column),
        ))
    }
}

/// Every source column must exist in the destination; order does not matter
fn check_columns(source_columns: &[String], destination: &[ColumnInfo], origin: &str) -> LoadOutcome<()> {
    let unknown: Vec<&str> = source_columns
        .iter()
        .filter(|name| !destination.iter().any(|c| &c.name == *name))
        .map(String::as_str)
        .collect();

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(LoadError::transfer(
            origin,
            format!("columns not in destination table: {}", unknown.join(", ")),
        ))
    }
}

async fn copy_into(
    staging: &mut StagingArea,
    origin: &str,
    copy_sql: &str,
    body: CopyBody<'_>,
) -> LoadOutcome<u64> {
    let truncate_sql = format!("TRUNCATE {}", staging.quoted_name());
    let fail = |e: sqlx::Error| LoadError::transfer(origin, e);

    let mut tx = staging.connection().begin().await.map_err(fail)?;

    sqlx::query(&truncate_sql)
        .execute(&mut *tx)
        .await
        .map_err(fail)?;

    debug!(statement = copy_sql, "Starting COPY into staging");
    let mut copy = tx.copy_in_raw(copy_sql).await.map_err(fail)?;

    match body {
        CopyBody::Bytes(bytes) => {
            for chunk in bytes.chunks(COPY_CHUNK_SIZE) {
                copy.send(chunk).await.map_err(fail)?;
            }
        },
        CopyBody::File(mut file) => {
            let mut buf = vec![0u8; COPY_CHUNK_SIZE];
            loop {
                let read = match file.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        let reason = format!("failed to read source: {}", e);
                        copy.abort(reason.clone()).await.ok();
                        return Err(LoadError::transfer(origin, reason));
                    },
                };
                copy.send(&buf[..read]).await.map_err(fail)?;
            }
        },
    }

    let rows = copy.finish().await.map_err(fail)?;
    tx.commit().await.map_err(fail)?;

    Ok(rows)
}
