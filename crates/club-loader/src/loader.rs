//! Load orchestration
//!
//! [`BatchLoader::batch_load`] runs the four steps of a load in order:
//! create a staging table, bulk copy the source into it, merge it into the
//! destination, release the staging table. Every failure is reported through
//! the returned [`LoadResult`]; the staging table is released on every path.

use chrono::NaiveDate;
use sqlx::PgPool;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::config::LoaderConfig;
use crate::db::create_pool;
use crate::error::{LoadError, LoadOutcome};
use crate::plan::{JobOutcome, LoadPlan, PlanReport, PlannedLoad};
use crate::request::LoadRequest;
use crate::result::{LoadProgress, LoadResult};
use crate::source::LoadSource;
use crate::schema::require_column;
use crate::staging::StagingArea;
use crate::transfer::{load_into_staging, require_source_column};
use crate::upsert::upsert;

/// Runs idempotent loads against one connection pool
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct BatchLoader {
    pool: PgPool,
}

impl BatchLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration
    pub async fn connect(config: &LoaderConfig) -> LoadOutcome<Self> {
        let pool = create_pool(&config.database).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Load one batch into its destination table
    ///
    /// Never returns an error: failures come back as a result with
    /// `success() == false` and the counters reached before the failure.
    #[instrument(
        skip_all,
        fields(source = %request.source.identifier(), destination = %request.destination)
    )]
    pub async fn batch_load(&self, request: &LoadRequest) -> LoadResult {
        let started = Instant::now();
        let mut progress = LoadProgress::default();

        info!("Starting batch load");
        let outcome = self.run(request, &mut progress).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &outcome {
            Ok(()) => info!(
                rows_loaded = ?progress.rows_loaded,
                rows_merged = ?progress.upsert.map(|s| s.rows_merged),
                total_rows = ?progress.upsert.map(|s| s.total_rows_in_destination),
                duration_ms,
                "Batch load completed"
            ),
            Err(e) => error!(error = %e, kind = %e.kind(), duration_ms, "Batch load failed"),
        }

        LoadResult::new(
            request.source.identifier(),
            request.destination.to_string(),
            progress,
            outcome.err().as_ref(),
            duration_ms,
        )
    }

    async fn run(&self, request: &LoadRequest, progress: &mut LoadProgress) -> LoadOutcome<()> {
        if let LoadSource::File(file) = &request.source {
            if !file.exists() {
                return Err(LoadError::SourceNotFound(file.path.clone()));
            }
        }

        let conn = self.pool.acquire().await?;
        let mut staging = StagingArea::create(conn, &request.destination).await?;

        let outcome = stage_and_merge(&mut staging, request, progress).await;

        if let Err(e) = staging.release().await {
            warn!(error = %e, "Staging release failed");
        }

        outcome
    }

    /// Run every job of `plan` for `date`, one after another
    ///
    /// A failed job does not stop the ones after it.
    #[instrument(skip_all, fields(date = %date, jobs = plan.jobs.len()))]
    pub async fn run_plan(&self, plan: &LoadPlan, date: NaiveDate) -> club_common::Result<PlanReport> {
        let planned = plan.requests_for(date)?;
        let mut outcomes = Vec::with_capacity(planned.len());

        for load in planned {
            match load {
                PlannedLoad::Ready { job, request } => {
                    info!(job = %job, "Running load job");
                    let result = self.batch_load(&request).await;
                    outcomes.push(JobOutcome::Loaded { job, result });
                },
                PlannedLoad::Skipped { job, path } => {
                    info!(job = %job, path = %path.display(), "No file for job, skipping");
                    outcomes.push(JobOutcome::Skipped { job, path });
                },
            }
        }

        let report = PlanReport { date, outcomes };
        info!(
            loaded = report.loaded().count(),
            skipped = report.skipped_count(),
            succeeded = report.all_succeeded(),
            "Load plan finished"
        );

        Ok(report)
    }
}

async fn stage_and_merge(
    staging: &mut StagingArea,
    request: &LoadRequest,
    progress: &mut LoadProgress,
) -> LoadOutcome<()> {
    // Reject a bad key or update list before moving any data
    let destination = &request.destination;
    require_column(destination, staging.columns(), &request.primary_key)?;
    let provided = require_source_column(&request.source, &request.primary_key)?;
    request.update_columns.resolve(
        destination,
        staging.columns(),
        &request.primary_key,
        Some(&provided),
    )?;

    let rows = load_into_staging(&request.source, staging).await?;
    progress.rows_loaded = Some(rows);

    let stats = upsert(
        staging,
        destination,
        &request.primary_key,
        &request.update_columns,
    )
    .await?;
    progress.upsert = Some(stats);

    Ok(())
}
