//! Incident CLI - ingest exports, print SLA reports, export filtered views
//!
//! Usage:
//!   incident-cli ingest --descriptive desc.csv --ticketing tickets.csv
//!   incident-cli report --sector NOC --origin ticketing --json
//!   incident-cli export --out incidents.csv

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use incident_core::{distinct_sectors, CanonicalIncident, Dashboard, IncidentFilter, Origin};
use incident_ingest::{export, IncidentStore, IngestConfig, IngestError, IngestPipeline};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Unified incident SLA tooling
#[derive(Parser, Debug)]
#[command(name = "incident-cli")]
#[command(about = "Ingest incident exports and report SLA compliance")]
struct Args {
    /// SQLite database path
    #[arg(long, env = "INCIDENT_DB_PATH", global = true)]
    db: Option<PathBuf>,

    /// Ingest configuration (YAML or JSON)
    #[arg(long, env = "INCIDENT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize both exports and upsert them into the store
    Ingest {
        #[arg(long)]
        descriptive: PathBuf,
        #[arg(long)]
        ticketing: PathBuf,
    },

    /// Print the SLA summary for the stored history
    Report {
        #[command(flatten)]
        filter: FilterArgs,

        /// Print the full dashboard as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the filtered view as a spreadsheet-ready delimited file
    Export {
        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// Sector to include (repeatable); defaults to the preferred sectors
    #[arg(long = "sector")]
    sectors: Vec<String>,

    /// Origin to include (repeatable): descriptive, ticketing
    #[arg(long = "origin")]
    origins: Vec<Origin>,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("incident_ingest=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(ingest) = e.downcast_ref::<IngestError>() {
                for report in ingest.reports() {
                    eprintln!("[{}] {}", report.code.as_str(), report.message);
                }
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => IngestConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => IngestConfig::default(),
    };
    let db_path = args.db.clone().unwrap_or_else(default_db_path);
    let store = IncidentStore::open(&db_path)
        .with_context(|| format!("opening store {}", db_path.display()))?;
    let now = Local::now().naive_local();

    match args.command {
        Command::Ingest {
            descriptive,
            ticketing,
        } => {
            let pipeline = IngestPipeline::new(config)?;
            let outcome = pipeline.ingest_files(&descriptive, &ticketing, &store, now)?;

            println!("Run {}", outcome.summary.run_id);
            for stats in &outcome.summary.sources {
                println!(
                    "  {:<12} rows={} unparsed_opened={} derived_deadlines={} unidentified={}",
                    stats.origin.as_str(),
                    stats.rows,
                    stats.unparsed_opened_at,
                    stats.derived_deadlines,
                    stats.unidentified_failures
                );
            }
            println!(
                "Written: {}  Skipped: {}  Id collisions: {}",
                outcome.upsert.written,
                outcome.upsert.skipped.len(),
                outcome.upsert.id_collisions.len()
            );
            for skipped in &outcome.upsert.skipped {
                println!("  skipped row {} ({}): {}", skipped.row, skipped.id, skipped.reason);
            }
        }

        Command::Report { filter, json } => {
            let incidents = store.load_all(now)?;
            let filter = filter.resolve(&incidents, &config);
            let dashboard = Dashboard::build(incidents, &filter, now);

            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                print_dashboard(&dashboard);
            }
        }

        Command::Export { out, filter } => {
            let incidents = store.load_all(now)?;
            let filter = filter.resolve(&incidents, &config);
            let view = filter.apply(&incidents);
            write_export(&out, &view, &config)?;
            println!("Exported {} incidents to {}", view.len(), out.display());
        }
    }

    Ok(())
}

impl FilterArgs {
    fn resolve(self, incidents: &[CanonicalIncident], config: &IngestConfig) -> IncidentFilter {
        let filter = if self.sectors.is_empty() {
            let available = distinct_sectors(incidents);
            IncidentFilter::with_preferred_sectors(&available, &config.preferred_sectors)
        } else {
            IncidentFilter::all().with_sectors(self.sectors)
        };
        if self.origins.is_empty() {
            filter
        } else {
            filter.with_origins(self.origins)
        }
    }
}

fn write_export(
    out: &Path,
    view: &[&CanonicalIncident],
    config: &IngestConfig,
) -> Result<()> {
    export::write_file(out, view.iter().copied(), config.export_delimiter as u8)
        .with_context(|| format!("writing {}", out.display()))
}

fn print_dashboard(dashboard: &Dashboard) {
    for warning in &dashboard.warnings {
        println!("warning: {}", warning);
    }
    let s = &dashboard.summary;
    println!("Total: {}  Overdue: {}  On time: {}", s.total, s.overdue, s.on_time);

    println!("\nBy failure type:");
    for entry in &dashboard.by_failure_type {
        println!("  {:>5}  {}", entry.count, entry.key);
    }
    println!("\nBy sector:");
    for entry in &dashboard.by_sector {
        println!("  {:>5}  {}", entry.count, entry.key);
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("incident-hub")
        .join("incidents.db")
}
