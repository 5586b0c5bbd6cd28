//! eCFR ingester (ecfr-ingest) - Main entry point
//!
//! Sweeps point-in-time regulatory documents, extracts per-section records
//! and stores them as dated versions.

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ecfr_common::config::resolve_config_path;
use ecfr_common::dates::{annual_dates, parse_issue_date};
use ecfr_common::db::init_database;
use ecfr_ingest::config::{IngestConfig, StoragePaths, MODULE_NAME};
use ecfr_ingest::db::{PersistenceSink, SqliteSectionStore};
use ecfr_ingest::services::batch_writer::BatchWriter;
use ecfr_ingest::staging::{
    changes_file_name, list_snapshot_files, load_snapshot_file, snapshot_file_name,
    write_staging, LoadReport,
};
use ecfr_ingest::IngestContext;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ecfr-ingest
#[derive(Parser, Debug)]
#[command(name = "ecfr-ingest")]
#[command(about = "Point-in-time regulatory text ingester")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true, env = "ECFR_DATABASE")]
    database: Option<PathBuf>,

    /// Root folder holding the database and staging files
    #[arg(long, global = true, env = "ECFR_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, extract and store every title at annual dates
    Pipeline {
        #[arg(long, value_parser = parse_date)]
        start_date: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date)]
        end_date: Option<NaiveDate>,
    },
    /// Extract titles at one date into staging files
    Snapshot {
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,
        /// Title numbers (default: every configured title)
        #[arg(long, value_delimiter = ',')]
        titles: Vec<u32>,
    },
    /// Rebuild one title's change history into a staging file
    Changes {
        #[arg(long)]
        title: u32,
        #[arg(long, value_parser = parse_date)]
        since: Option<NaiveDate>,
    },
    /// Store snapshot staging files; title dates already stored are skipped
    Load {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print the latest first issue date over all titles
    StartDate,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    parse_issue_date(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), MODULE_NAME);
    let config = IngestConfig::load(Some(config_path.as_path()))
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    init_tracing(&config, args.log_level.as_deref())?;

    info!("Starting ecfr-ingest v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: {} ({})",
        config_path.display(),
        if config_path.exists() { "loaded" } else { "not found, using defaults" }
    );

    let paths = config.storage_paths(args.root_folder.clone(), args.database.clone());
    let context = IngestContext::new(config).context("Failed to initialize ingester")?;

    match args.command {
        Command::Pipeline {
            start_date,
            end_date,
        } => run_pipeline(&context, &paths, start_date, end_date).await,
        Command::Snapshot { date, titles } => run_snapshot(&context, &paths, date, titles).await,
        Command::Changes { title, since } => run_changes(&context, &paths, title, since).await,
        Command::Load { dir } => run_load(&context, &paths, dir).await,
        Command::StartDate => run_start_date(&context).await,
    }
}

fn init_tracing(config: &IngestConfig, cli_level: Option<&str>) -> Result<()> {
    let level = cli_level.unwrap_or(config.logging.level.as_str()).to_string();

    let file_layer = match &config.logging.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ecfr_ingest={},ecfr_common={}", level, level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

async fn open_writer(context: &IngestContext, paths: &StoragePaths) -> Result<BatchWriter> {
    let pool = init_database(&paths.database)
        .await
        .with_context(|| format!("Failed to open database {}", paths.database.display()))?;
    let sink: Arc<dyn PersistenceSink> = Arc::new(SqliteSectionStore::new(pool));

    BatchWriter::new(sink, context.config.storage.batch_size).context("Invalid batch size")
}

async fn run_pipeline(
    context: &IngestContext,
    paths: &StoragePaths,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<()> {
    let start = start_date.unwrap_or(context.config.pipeline.start_date);
    let end = end_date.unwrap_or(context.config.pipeline.end_date);
    anyhow::ensure!(start <= end, "start date {} is after end date {}", start, end);

    let dates = annual_dates(start, end);
    info!("Dates: {} from {} to {}", dates.len(), start, end);
    info!("Database: {}", paths.database.display());

    let writer = open_writer(context, paths).await?;
    let pipeline = context.date_title_pipeline(writer);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let summary = pipeline.run(&dates, &cancel).await;
    println!("{}", summary);

    if summary.cancelled {
        warn!("Run cancelled before all dates were processed");
    }
    Ok(())
}

async fn run_snapshot(
    context: &IngestContext,
    paths: &StoragePaths,
    date: NaiveDate,
    titles: Vec<u32>,
) -> Result<()> {
    let titles = if titles.is_empty() {
        context.config.titles()
    } else {
        titles
    };

    let mut failed = 0usize;
    for title in titles {
        match context.snapshot_title(date, title).await {
            Ok(records) => {
                write_staging(&paths.staging_dir, &snapshot_file_name(title), &records)?;
                println!("title {}: {} sections", title, records.len());
            }
            Err(e) => {
                error!(title, issue_date = %date, error = %e, "Snapshot failed");
                println!("title {}: FAILED [{}] {}", title, e.kind_label(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        warn!(failed, "Some titles could not be staged");
    }
    Ok(())
}

async fn run_changes(
    context: &IngestContext,
    paths: &StoragePaths,
    title: u32,
    since: Option<NaiveDate>,
) -> Result<()> {
    let since = since.unwrap_or(context.config.pipeline.changes_since);
    let report = context
        .change_pipeline()
        .run(title, Some(since))
        .await
        .with_context(|| format!("Failed to list versions for title {}", title))?;

    let path = write_staging(&paths.staging_dir, &changes_file_name(title), &report.records)?;

    println!(
        "title {}: {} versions, {} records ({} from headings), {} failed -> {}",
        title,
        report.versions,
        report.records.len(),
        report.fallbacks,
        report.failed.len(),
        path.display()
    );
    for failure in &report.failed {
        println!(
            "  FAILED {} @ {}: {}",
            failure.identifier, failure.issue_date, failure.reason
        );
    }
    Ok(())
}

async fn run_load(
    context: &IngestContext,
    paths: &StoragePaths,
    dir: Option<PathBuf>,
) -> Result<()> {
    let dir = dir.unwrap_or_else(|| paths.staging_dir.clone());
    let files = list_snapshot_files(&dir)?;
    if files.is_empty() {
        warn!("No staging files in {}", dir.display());
        return Ok(());
    }

    let writer = open_writer(context, paths).await?;
    let mut total = LoadReport::default();

    for file in files {
        let report = load_snapshot_file(&writer, &file)
            .await
            .with_context(|| format!("Failed to store {}", file.display()))?;
        println!(
            "{}: {} stored, {} rejected, {} title dates already stored",
            file.display(),
            report.stored.persisted,
            report.stored.rejected,
            report.skipped
        );
        total.merge(report);
    }

    println!(
        "Loaded {} records ({} rejected) in {} batches; skipped {} stored title dates",
        total.stored.persisted, total.stored.rejected, total.stored.batches, total.skipped
    );
    Ok(())
}

async fn run_start_date(context: &IngestContext) -> Result<()> {
    match context.start_date_finder().find().await {
        Some(date) => {
            println!("{}", date);
            Ok(())
        }
        None => anyhow::bail!("No title reported a first issue date"),
    }
}

/// Cancel the token on Ctrl+C
async fn cancel_on_signal(cancel: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, finishing the current date");
            cancel.cancel();
        }
        Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
    }
}
