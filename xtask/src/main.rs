//! Build automation tasks for the club loader workspace
//!
//! Run with `cargo run -p xtask -- <task>`.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for the club loader", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the club-loader CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<club_loader::Cli>();

    let content = format!(
        r#"# club-loader CLI Reference

Auto-generated from the CLI source code. Last updated: {}.

## Overview

`club-loader` loads the club's daily CSV extracts (ticket sales, dues
payments) into PostgreSQL. Every load lands in a private staging table and is
merged with `INSERT ... ON CONFLICT`, so re-running a load never duplicates
rows.

## Quick Start

```bash
# Load one file, updating every non-key column on conflict
club-loader load \
  --csv-path data/raw/tickets_20240115.csv \
  --target-table entrada \
  --primary-key identrada

# Only refresh price and status of existing dues
club-loader load \
  --csv-path data/raw/dues_20240115.csv \
  --target-table raw.cuota \
  --primary-key idcuota \
  --update-columns precio estado

# Load every feed generated today
club-loader daily

# Re-run a past day with a custom plan, printing JSON results
club-loader daily --plan config/daily_plan.toml --date 2024-01-15 --json
```

## Commands

{}

## Environment Variables

- `DATABASE_URL` - PostgreSQL connection string
- `DB_MAX_CONNECTIONS`, `DB_MIN_CONNECTIONS` - pool size
- `DB_CONNECT_TIMEOUT`, `DB_IDLE_TIMEOUT` - pool timeouts in seconds
- `CLUB_LOADER_SCHEMA` - schema for unqualified tables (default: `raw`)
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILTER` - logging

## Exit Status

`0` when every load succeeded, `1` otherwise.

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
