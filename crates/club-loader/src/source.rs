//! Load sources: delimited files on disk and in-memory tables

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default field delimiter for file sources.
pub const DEFAULT_DELIMITER: u8 = b',';

/// Byte form of a field delimiter for CSV `COPY`
///
/// `None` for non-ASCII characters, the quote character and line breaks.
pub fn delimiter_byte(c: char) -> Option<u8> {
    match c {
        '"' | '\n' | '\r' => None,
        c if c.is_ascii() => Some(c as u8),
        _ => None,
    }
}

/// Invalid in-memory table shape
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TableError {
    #[error("Table has no columns")]
    NoColumns,

    #[error("Column name at position {0} is empty")]
    EmptyColumnName(usize),

    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("Row {row} has {actual} values, expected {expected}")]
    ArityMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Rows of optional text cells under named columns
///
/// Cells are handed to PostgreSQL as text and cast to the staging column
/// types during the copy. `None` loads as `NULL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl DataTable {
    pub fn new<I, S>(columns: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        validate_columns(&columns)?;

        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Append one row; must have a value for every column
    pub fn push_row<I, V>(&mut self, values: I) -> Result<(), TableError>
    where
        I: IntoIterator<Item = Option<V>>,
        V: Into<String>,
    {
        let row: Vec<Option<String>> = values.into_iter().map(|v| v.map(Into::into)).collect();

        if row.len() != self.columns.len() {
            return Err(TableError::ArityMismatch {
                row: self.rows.len(),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }

        self.rows.push(row);
        Ok(())
    }

    /// Builder-style [`DataTable::push_row`]
    pub fn with_row<I, V>(mut self, values: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = Option<V>>,
        V: Into<String>,
    {
        self.push_row(values)?;
        Ok(self)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Encode all rows in PostgreSQL's text `COPY` format
    pub fn to_copy_text(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            encode_copy_row(&mut out, row);
        }
        out
    }
}

fn validate_columns(columns: &[String]) -> Result<(), TableError> {
    if columns.is_empty() {
        return Err(TableError::NoColumns);
    }

    let mut seen = std::collections::HashSet::with_capacity(columns.len());
    for (position, name) in columns.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(TableError::EmptyColumnName(position));
        }
        if !seen.insert(name.as_str()) {
            return Err(TableError::DuplicateColumn(name.clone()));
        }
    }

    Ok(())
}

/// Append one tab-separated row terminated by a newline
///
/// `NULL` becomes `\N`; backslash, tab, newline and carriage return are
/// backslash-escaped so values survive verbatim.
fn encode_copy_row(out: &mut String, row: &[Option<String>]) {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            out.push('\t');
        }
        match cell {
            None => out.push_str("\\N"),
            Some(value) => {
                for ch in value.chars() {
                    match ch {
                        '\\' => out.push_str("\\\\"),
                        '\t' => out.push_str("\\t"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        other => out.push(other),
                    }
                }
            },
        }
    }
    out.push('\n');
}

/// Delimited text file with a header row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSource {
    pub path: PathBuf,
    pub delimiter: u8,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: DEFAULT_DELIMITER,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read the header row
    ///
    /// Names are trimmed; a missing, empty or duplicated name is an error.
    pub fn read_header(&self) -> Result<Vec<String>, HeaderError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_path(&self.path)
            .map_err(HeaderError::Csv)?;

        let header: Vec<String> = reader
            .headers()
            .map_err(HeaderError::Csv)?
            .iter()
            .map(|name| name.trim().to_string())
            .collect();

        if header.iter().all(String::is_empty) {
            return Err(HeaderError::Missing);
        }

        validate_columns(&header).map_err(HeaderError::Invalid)?;
        Ok(header)
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Header row could not be used
#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("failed to read header: {0}")]
    Csv(csv::Error),

    #[error("file has no header row")]
    Missing,

    #[error("invalid header: {0}")]
    Invalid(TableError),
}

/// What a load reads from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadSource {
    File(FileSource),
    Table(DataTable),
}

impl LoadSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(FileSource::new(path))
    }

    pub fn table(table: DataTable) -> Self {
        Self::Table(table)
    }

    /// Human-readable identifier used in results and logs
    pub fn identifier(&self) -> String {
        match self {
            LoadSource::File(file) => file.path.display().to_string(),
            LoadSource::Table(table) => format!("in-memory table ({} rows)", table.len()),
        }
    }
}

impl From<DataTable> for LoadSource {
    fn from(table: DataTable) -> Self {
        Self::Table(table)
    }
}

impl From<FileSource> for LoadSource {
    fn from(file: FileSource) -> Self {
        Self::File(file)
    }
}
