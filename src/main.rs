//! clustermap — multi-resolution place clustering CLI.
//!
//! `run` reads the configuration (the readiness signal), acknowledges it,
//! drives the clustering orchestrator, and prints exactly one JSON status
//! report to stdout: {"status":"OK"} or {"status":"ERROR","message":...}.
//! The remaining subcommands are operational helpers around the same
//! database.
//!
//! Usage:
//!   clustermap --db places.db run
//!   CLUSTERMAP_DB=places.db clustermap seed places.json
//!   clustermap --config cluster.json run

use clap::{Parser, Subcommand};
use clustermap_lib::config::Config;
use clustermap_lib::db::{Database, NewPlace};
use clustermap_lib::orchestrator::{self, StatusReport};
use clustermap_lib::zoom::ZoomTable;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clustermap")]
#[command(version, about = "Multi-resolution place clustering", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// JSON config file (connection_string, run_timeout_secs, zoom_radius)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Database path (overrides the config file and CLUSTERMAP_DB)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster every configured zoom level and print one status report
    Run,
    /// Ingest places from a JSON array file: [{"name", "lat", "lon"}, ...]
    Seed {
        /// Path to the JSON file
        file: String,
    },
    /// Per-level progress: clusters created, places still unclustered
    Status,
    /// Dump one zoom level's clusters as JSON
    Clusters {
        #[arg(long)]
        zoom: u8,
    },
    /// Clear all assignments and drop cluster tables for a fresh run
    Reset,
}

fn resolve_config(cli: &Cli) -> Result<Config, String> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => {
            let db = cli
                .db
                .clone()
                .or_else(|| std::env::var("CLUSTERMAP_DB").ok())
                .ok_or("no database configured: pass --config or --db, or set CLUSTERMAP_DB")?;
            Config::from_connection_string(&db)
        }
    };
    if let Some(db) = &cli.db {
        config.connection_string = db.clone();
    }
    Ok(config)
}

fn open_database(config: &Config) -> Result<Database, String> {
    Database::new(&config.connection_string)
        .map_err(|e| format!("opening database {}: {}", config.connection_string, e))
}

async fn cmd_run(config: &Config, zooms: &ZoomTable) -> StatusReport {
    match open_database(config) {
        Ok(db) => orchestrator::run(Arc::new(db), zooms, config.run_timeout_secs).await,
        Err(e) => StatusReport::error(e),
    }
}

fn cmd_seed(db: &Database, file: &str) -> Result<(), String> {
    let text = std::fs::read_to_string(file).map_err(|e| format!("reading {}: {}", file, e))?;
    let places: Vec<NewPlace> =
        serde_json::from_str(&text).map_err(|e| format!("parsing {}: {}", file, e))?;

    let inserted = db.insert_places(&places).map_err(|e| e.to_string())?;
    println!("[Seed] Inserted {} places ({} total)", inserted, db.count_places().map_err(|e| e.to_string())?);
    Ok(())
}

fn cmd_status(db: &Database, zooms: &ZoomTable) -> Result<(), String> {
    db.ensure_cluster_tables(zooms).map_err(|e| e.to_string())?;

    let total = db.count_places().map_err(|e| e.to_string())?;
    println!("[Status] {} places", total);
    for level in zooms.levels() {
        let clusters = db.count_clusters(level.zoom).map_err(|e| e.to_string())?;
        let unclustered = db.count_unclustered(level.zoom).map_err(|e| e.to_string())?;
        println!(
            "[Status] zoom {:>2} (radius {:>8} m): {} clusters, {} unclustered",
            level.zoom, level.radius_m, clusters, unclustered
        );
    }
    Ok(())
}

fn cmd_clusters(db: &Database, zooms: &ZoomTable, zoom: u8) -> Result<(), String> {
    if zooms.radius_for(zoom).is_none() {
        return Err(format!("zoom {} is not configured", zoom));
    }
    db.ensure_cluster_tables(zooms).map_err(|e| e.to_string())?;

    let clusters = db.get_clusters(zoom).map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&clusters).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn cmd_reset(db: &Database, zooms: &ZoomTable) -> Result<(), String> {
    db.reset_clusters(zooms).map_err(|e| e.to_string())?;
    println!("[Reset] Cleared assignments and dropped cluster tables");
    Ok(())
}

/// Open the database and run one of the synchronous helper commands
fn with_database(config: &Config, f: impl FnOnce(&Database) -> Result<(), String>) -> ExitCode {
    match open_database(config).and_then(|db| f(&db)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("clustermap: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("clustermap: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let zooms = match config.zoom_table() {
        Ok(zooms) => zooms,
        Err(e) => {
            eprintln!("clustermap: invalid zoom table: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match &cli.command {
        Commands::Run => {
            // Acknowledge the configuration, then run; whatever happens
            // next ends in exactly one report on stdout
            println!("[clustermap] Configuration received: {}", config.connection_string);
            let report = cmd_run(&config, &zooms).await;
            let line = serde_json::to_string(&report).unwrap_or_else(|_| {
                r#"{"status":"ERROR","message":"report serialization failed"}"#.to_string()
            });
            println!("{}", line);
            if report.is_ok() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
        }
        Commands::Seed { file } => with_database(&config, |db| cmd_seed(db, file)),
        Commands::Status => with_database(&config, |db| cmd_status(db, &zooms)),
        Commands::Clusters { zoom } => with_database(&config, |db| cmd_clusters(db, &zooms, *zoom)),
        Commands::Reset => with_database(&config, |db| cmd_reset(db, &zooms)),
    }
}
