//! Load requests and the conflict-update policy

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadOutcome};
use crate::schema::{ColumnInfo, TableRef};
use crate::source::LoadSource;

/// Which destination columns an upsert overwrites when the key already exists
///
/// The default, [`UpdateColumns::AllExceptKey`], makes the destination row
/// mirror the incoming one. [`UpdateColumns::Only`] limits the overwrite to
/// the listed columns; every other column keeps its stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateColumns {
    #[default]
    AllExceptKey,
    Only(Vec<String>),
}

impl UpdateColumns {
    pub fn only<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(columns.into_iter().map(Into::into).collect())
    }

    /// `None` keeps the default; `Some(list)` restricts the update set
    pub fn from_option(columns: Option<Vec<String>>) -> Self {
        columns.map(Self::Only).unwrap_or_default()
    }

    /// Concrete column names to overwrite, in destination order for the default
    ///
    /// `provided` lists the columns the source actually carries, when known.
    /// The default then only covers those, so columns a partial source never
    /// had keep their stored values. Explicit lists must name existing,
    /// non-key columns the source provides. An empty result means conflicting
    /// rows are left untouched.
    pub fn resolve(
        &self,
        table: &TableRef,
        columns: &[ColumnInfo],
        primary_key: &str,
        provided: Option<&[String]>,
    ) -> LoadOutcome<Vec<String>> {
        let in_source = |name: &str| provided.map_or(true, |p| p.iter().any(|c| c == name));

        match self {
            UpdateColumns::AllExceptKey => Ok(columns
                .iter()
                .filter(|c| c.name != primary_key && in_source(&c.name))
                .map(|c| c.name.clone())
                .collect()),
            UpdateColumns::Only(listed) => {
                let mut resolved: Vec<String> = Vec::with_capacity(listed.len());
                for name in listed {
                    if name == primary_key {
                        return Err(LoadError::schema(
                            table,
                            format!("primary key '{}' cannot be an update column", name),
                        ));
                    }
                    if !columns.iter().any(|c| &c.name == name) {
                        return Err(LoadError::schema(
                            table,
                            format!("update column '{}' does not exist", name),
                        ));
                    }
                    if !in_source(name) {
                        return Err(LoadError::schema(
                            table,
                            format!("update column '{}' is not provided by the source", name),
                        ));
                    }
                    if !resolved.contains(name) {
                        resolved.push(name.clone());
                    }
                }
                Ok(resolved)
            },
        }
    }
}

/// Everything one `batch_load` call needs
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub source: LoadSource,
    pub destination: TableRef,
    pub primary_key: String,
    pub update_columns: UpdateColumns,
}

impl LoadRequest {
    pub fn new(
        source: impl Into<LoadSource>,
        destination: TableRef,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            destination,
            primary_key: primary_key.into(),
            update_columns: UpdateColumns::default(),
        }
    }

    pub fn with_update_columns(mut self, update_columns: UpdateColumns) -> Self {
        self.update_columns = update_columns;
        self
    }
}
