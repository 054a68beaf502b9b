//! Destination table references and column metadata
//!
//! Column lists always come from `information_schema.columns` in ordinal
//! order, never from the data being loaded.

use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::debug;

use crate::error::{LoadError, LoadOutcome};

/// Schema-qualified table name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Parse `schema.table`, or a bare `table` placed in `default_schema`
    pub fn parse(name: &str, default_schema: &str) -> Option<Self> {
        let name = name.trim();
        let (schema, table) = match name.split_once('.') {
            Some((schema, table)) => (schema.trim(), table.trim()),
            None => (default_schema.trim(), name),
        };

        if schema.is_empty() || table.is_empty() || table.contains('.') {
            return None;
        }

        Some(Self::new(schema, table))
    }

    /// `"schema"."table"`, safe to splice into SQL
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// One destination column as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Comma-separated quoted column list
pub fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve the destination's columns in ordinal order
///
/// A table with no visible columns is treated as missing.
pub async fn resolve_columns(
    conn: &mut PgConnection,
    table: &TableRef,
) -> LoadOutcome<Vec<ColumnInfo>> {
    let rows: Vec<(String, String, String)> = sqlx::query_as(
        r#"
        SELECT column_name::text, data_type::text, is_nullable::text
        FROM information_schema.columns
        WHERE table_schema = $1 AND table_name = $2
        ORDER BY ordinal_position
        "#,
    )
    .bind(&table.schema)
    .bind(&table.table)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| LoadError::schema(table, format!("failed to read column metadata: {}", e)))?;

    if rows.is_empty() {
        return Err(LoadError::schema(
            table,
            "table does not exist or has no visible columns",
        ));
    }

    let columns: Vec<ColumnInfo> = rows
        .into_iter()
        .map(|(name, data_type, is_nullable)| ColumnInfo {
            name,
            data_type,
            nullable: is_nullable.eq_ignore_ascii_case("YES"),
        })
        .collect();

    debug!(table = %table, columns = columns.len(), "Resolved destination columns");

    Ok(columns)
}

/// Fail unless `column` is one of `columns`
pub fn require_column(table: &TableRef, columns: &[ColumnInfo], column: &str) -> LoadOutcome<()> {
    if columns.iter().any(|c| c.name == column) {
        Ok(())
    } else {
        Err(LoadError::schema(
            table,
            format!("column '{}' does not exist", column),
        ))
    }
}

/// Row count of a table (quoted name expected)
pub(crate) async fn count_rows(conn: &mut PgConnection, quoted_table: &str) -> Result<u64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quoted_table))
        .fetch_one(&mut *conn)
        .await?;

    Ok(u64::try_from(count).unwrap_or_default())
}
