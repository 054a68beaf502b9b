//! Merge of a staging table into its destination
//!
//! The merge is one `INSERT ... SELECT ... ON CONFLICT (key) DO UPDATE`
//! statement. It runs in a transaction together with the row counts, so a
//! batch is merged completely or not at all, and re-running the same batch
//! converges to the same destination state.

use serde::{Deserialize, Serialize};
use sqlx::Connection;
use tracing::{info, instrument};

use crate::error::{LoadError, LoadOutcome};
use crate::request::UpdateColumns;
use crate::schema::{column_list, count_rows, quote_ident, require_column, resolve_columns, TableRef};
use crate::staging::StagingArea;

/// Row statistics recorded after a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertStats {
    /// Rows read from staging
    pub rows_processed: u64,
    /// Rows inserted or updated by the merge statement
    pub rows_merged: u64,
    /// Destination row count after the merge
    pub total_rows_in_destination: u64,
}

/// Build the merge statement
///
/// `columns` is the full destination column list; an empty `update_columns`
/// turns conflicts into no-ops.
pub fn build_upsert_sql(
    destination: &TableRef,
    staging_table: &str,
    columns: &[String],
    primary_key: &str,
    update_columns: &[String],
) -> String {
    let column_sql = column_list(columns);

    let conflict_action = if update_columns.is_empty() {
        "DO NOTHING".to_string()
    } else {
        let assignments = update_columns
            .iter()
            .map(|c| {
                let col = quote_ident(c);
                format!("{col} = EXCLUDED.{col}")
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("DO UPDATE SET {}", assignments)
    };

    format!(
        "INSERT INTO {dest} ({cols}) SELECT {cols} FROM {staging} ON CONFLICT ({key}) {action}",
        dest = destination.quoted(),
        cols = column_sql,
        staging = staging_table,
        key = quote_ident(primary_key),
        action = conflict_action,
    )
}

/// Merge everything in `staging` into `destination`
///
/// With the default update policy only the columns the last transfer
/// filled are overwritten on conflict.
///
/// Fails with a schema resolution error when the key or an update column
/// does not exist, and with an upsert error when the statement fails. Either
/// way the transaction is rolled back and the destination is unchanged.
#[instrument(skip_all, fields(staging = %staging.name(), destination = %destination, primary_key = %primary_key))]
pub async fn upsert(
    staging: &mut StagingArea,
    destination: &TableRef,
    primary_key: &str,
    update_columns: &UpdateColumns,
) -> LoadOutcome<UpsertStats> {
    let staging_table = staging.quoted_name();
    let loaded = staging.loaded_columns().map(<[String]>::to_vec);
    let fail = |e: sqlx::Error| LoadError::upsert(destination, e);

    let mut tx = staging.connection().begin().await.map_err(fail)?;

    let columns = resolve_columns(&mut tx, destination).await?;
    require_column(destination, &columns, primary_key)?;
    let updates = update_columns.resolve(destination, &columns, primary_key, loaded.as_deref())?;
    let names: Vec<String> = columns.into_iter().map(|c| c.name).collect();

    let merge_sql = build_upsert_sql(destination, &staging_table, &names, primary_key, &updates);

    let rows_merged = sqlx::query(&merge_sql)
        .execute(&mut *tx)
        .await
        .map_err(fail)?
        .rows_affected();

    let rows_processed = count_rows(&mut tx, &staging_table).await.map_err(fail)?;
    let total_rows_in_destination = count_rows(&mut tx, &destination.quoted())
        .await
        .map_err(fail)?;

    tx.commit().await.map_err(fail)?;

    info!(
        rows_processed,
        rows_merged,
        total_rows_in_destination,
        update_columns = updates.len(),
        "Upsert completed"
    );

    Ok(UpsertStats {
        rows_processed,
        rows_merged,
        total_rows_in_destination,
    })
}
