//! Daily load plans
//!
//! The upstream generator drops one CSV per feed and day into a directory
//! (`tickets_20240115.csv`, `dues_20240115.csv`, ...). A [`LoadPlan`] maps
//! each feed to its raw table so a whole day can be loaded in one call.
//!
//! ```toml
//! data_dir = "data/raw"
//! schema = "raw"
//!
//! [[jobs]]
//! name = "tickets"
//! file_prefix = "tickets"
//! table = "entrada"
//! primary_key = "identrada"
//! ```

use chrono::NaiveDate;
use club_common::error::read_toml;
use club_common::{ClubError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_SCHEMA;
use crate::request::{LoadRequest, UpdateColumns};
use crate::result::LoadResult;
use crate::schema::TableRef;
use crate::source::{self, FileSource, LoadSource};

/// Where the daily generator writes its files.
pub const DEFAULT_DATA_DIR: &str = "data/raw";

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_skip_missing() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadPlan {
    /// Directory holding the daily files
    pub data_dir: PathBuf,

    /// Schema for job tables given without one
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Report absent files as skipped instead of failed loads
    #[serde(default = "default_skip_missing")]
    pub skip_missing: bool,

    pub jobs: Vec<LoadJob>,
}

/// One feed: `<file_prefix>_<YYYYMMDD>.csv` into `table`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadJob {
    pub name: String,
    pub file_prefix: String,
    /// `table` or `schema.table`
    pub table: String,
    pub primary_key: String,
    #[serde(default)]
    pub update_columns: Option<Vec<String>>,
    #[serde(default)]
    pub delimiter: Option<char>,
}

impl LoadJob {
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}_{}.csv", self.file_prefix, date.format("%Y%m%d"))
    }
}

/// A job resolved for a specific day
#[derive(Debug, Clone)]
pub enum PlannedLoad {
    Ready { job: String, request: LoadRequest },
    Skipped { job: String, path: PathBuf },
}

impl LoadPlan {
    /// Read and validate a TOML plan
    pub fn from_file(path: &Path) -> Result<Self> {
        let plan: Self = read_toml(path)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Ticket sales into `raw.entrada` and dues payments into `raw.cuota`
    pub fn club_defaults(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            schema: default_schema(),
            skip_missing: true,
            jobs: vec![
                LoadJob {
                    name: "tickets".to_string(),
                    file_prefix: "tickets".to_string(),
                    table: "entrada".to_string(),
                    primary_key: "identrada".to_string(),
                    update_columns: None,
                    delimiter: None,
                },
                LoadJob {
                    name: "dues".to_string(),
                    file_prefix: "dues".to_string(),
                    table: "cuota".to_string(),
                    primary_key: "idcuota".to_string(),
                    update_columns: None,
                    delimiter: None,
                },
            ],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs.is_empty() {
            return Err(ClubError::config("Load plan has no jobs"));
        }

        let mut names = HashSet::new();
        for job in &self.jobs {
            if !names.insert(job.name.as_str()) {
                return Err(ClubError::config(format!("Duplicate job name '{}'", job.name)));
            }
            if job.file_prefix.trim().is_empty() || job.primary_key.trim().is_empty() {
                return Err(ClubError::config(format!(
                    "Job '{}' needs a file_prefix and a primary_key",
                    job.name
                )));
            }
            self.destination(job)?;
            delimiter_byte(job)?;
        }

        Ok(())
    }

    fn destination(&self, job: &LoadJob) -> Result<TableRef> {
        TableRef::parse(&job.table, &self.schema).ok_or_else(|| {
            ClubError::config(format!("Job '{}' has invalid table '{}'", job.name, job.table))
        })
    }

    /// Resolve every job against the files present for `date`
    pub fn requests_for(&self, date: NaiveDate) -> Result<Vec<PlannedLoad>> {
        self.jobs
            .iter()
            .map(|job| {
                let path = self.data_dir.join(job.file_name(date));

                if self.skip_missing && !path.is_file() {
                    return Ok(PlannedLoad::Skipped {
                        job: job.name.clone(),
                        path,
                    });
                }

                let mut source = FileSource::new(path);
                if let Some(delimiter) = delimiter_byte(job)? {
                    source = source.with_delimiter(delimiter);
                }

                let request = LoadRequest::new(
                    LoadSource::File(source),
                    self.destination(job)?,
                    job.primary_key.clone(),
                )
                .with_update_columns(UpdateColumns::from_option(job.update_columns.clone()));

                Ok(PlannedLoad::Ready {
                    job: job.name.clone(),
                    request,
                })
            })
            .collect()
    }
}

fn delimiter_byte(job: &LoadJob) -> Result<Option<u8>> {
    job.delimiter
        .map(|c| {
            source::delimiter_byte(c).ok_or_else(|| {
                ClubError::config(format!("Job '{}' has unsupported delimiter {:?}", job.name, c))
            })
        })
        .transpose()
}

/// What happened to one job of a plan
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Loaded { job: String, result: LoadResult },
    Skipped { job: String, path: PathBuf },
}

/// Results of running a plan for one day
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub date: NaiveDate,
    pub outcomes: Vec<JobOutcome>,
}

impl PlanReport {
    /// True unless some load ran and failed
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| match o {
            JobOutcome::Loaded { result, .. } => result.success(),
            JobOutcome::Skipped { .. } => true,
        })
    }

    pub fn loaded(&self) -> impl Iterator<Item = &LoadResult> {
        self.outcomes.iter().filter_map(|o| match o {
            JobOutcome::Loaded { result, .. } => Some(result),
            JobOutcome::Skipped { .. } => None,
        })
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, JobOutcome::Skipped { .. }))
            .count()
    }
}
