//! Club Loader - Main entry point

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use club_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use club_loader::plan::DEFAULT_DATA_DIR;
use club_loader::{
    BatchLoader, Cli, Commands, FileSource, JobOutcome, LoadPlan, LoadRequest, LoadResult,
    LoaderConfig, PlanReport, TableRef, UpdateColumns,
};
use colored::Colorize;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Console)
        .log_file_prefix("club-loader")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The loader works without logging
    let guard = init_logging(&log_config).ok();

    let code = match execute_command(&cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            1
        },
    };

    drop(guard);
    process::exit(code);
}

/// Execute the CLI command, returning whether every load succeeded
async fn execute_command(cli: &Cli) -> anyhow::Result<bool> {
    let mut config = LoaderConfig::load().context("Invalid loader configuration")?;
    config.database.url = cli.database_url.clone();

    let loader = BatchLoader::connect(&config)
        .await
        .context("Failed to connect to PostgreSQL")?;

    let succeeded = match &cli.command {
        Commands::Load {
            csv_path,
            target_table,
            schema,
            primary_key,
            update_columns,
            delimiter,
        } => {
            let destination = TableRef::parse(target_table, schema)
                .with_context(|| format!("Invalid target table '{}'", target_table))?;

            let source = FileSource::new(csv_path).with_delimiter(*delimiter);
            let request = LoadRequest::new(source, destination, primary_key.clone())
                .with_update_columns(UpdateColumns::from_option(update_columns.clone()));

            let result = loader.batch_load(&request).await;
            print_result(&result, cli.json)?;
            result.success()
        },

        Commands::Daily {
            plan,
            date,
            data_dir,
        } => {
            let mut plan = match plan {
                Some(path) => LoadPlan::from_file(path)
                    .with_context(|| format!("Failed to load plan {}", path.display()))?,
                None => {
                    let mut defaults = LoadPlan::club_defaults(DEFAULT_DATA_DIR);
                    defaults.schema = config.default_schema.clone();
                    defaults
                },
            };
            if let Some(dir) = data_dir {
                plan.data_dir = dir.clone();
            }

            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let report = loader.run_plan(&plan, date).await?;
            print_report(&report, cli.json)?;
            report.all_succeeded()
        },
    };

    loader.pool().close().await;
    Ok(succeeded)
}

fn print_result(result: &LoadResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print_summary(result);
    }
    Ok(())
}

fn print_report(report: &PlanReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("{}", format!("Daily load for {}", report.date).cyan().bold());
    println!();

    for outcome in &report.outcomes {
        match outcome {
            JobOutcome::Loaded { job, result } => {
                println!("{}", job.bold());
                print_summary(result);
            },
            JobOutcome::Skipped { job, path } => {
                println!("{}", job.bold());
                println!("{} No file at {}", "-".dimmed(), path.display());
            },
        }
        println!();
    }

    let status = if report.all_succeeded() {
        "all loads succeeded".green()
    } else {
        "some loads failed".red()
    };
    println!(
        "{} {} loaded, {} skipped, {}",
        "Summary:".cyan().bold(),
        report.loaded().count(),
        report.skipped_count(),
        status
    );

    Ok(())
}

fn print_summary(result: &LoadResult) {
    if result.success() {
        println!(
            "{} Loaded {} into {}",
            "✓".green(),
            result.source(),
            result.destination().cyan()
        );
    } else {
        println!(
            "{} Load of {} into {} failed",
            "✗".red(),
            result.source(),
            result.destination().cyan()
        );
    }

    if let Some(rows) = result.rows_loaded() {
        println!("  Rows staged:      {}", rows);
    }
    if let Some(rows) = result.rows_merged() {
        println!("  Rows merged:      {}", rows);
    }
    if let Some(rows) = result.total_rows_in_destination() {
        println!("  Destination rows: {}", rows);
    }
    if let Some(failure) = result.error() {
        println!("  Error ({}): {}", failure.kind, failure.message.red());
    }
    println!("  Duration:         {} ms", result.duration_ms());
}
