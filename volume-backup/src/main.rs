//! Volume Backup - Main entry point
//!
//! Stores a container's data volumes into an archive, or restores an archive
//! into a newly created container.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::time::Instant;
use volume_backup::config::{Config, Protocol};
use volume_backup::metrics::StoreMetrics;
use volume_backup::{utils, BackupEngine, DaemonClient, RestoreEngine};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Daemon address to connect to (overrides config)
    #[arg(long)]
    addr: Option<String>,

    /// Protocol to use (overrides config)
    #[arg(long, value_enum)]
    proto: Option<Protocol>,

    /// Print metrics lines for prometheus consumption
    #[arg(long)]
    metrics: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Store the volumes of a container's data container into an archive
    Store {
        /// Archive file to write
        filename: PathBuf,
        /// Container whose data should be stored
        container_id: String,
    },
    /// Restore an archive into a newly created container
    Restore {
        /// Archive file to read
        filename: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };
    if let Some(addr) = args.addr {
        config.daemon.addr = addr;
    }
    if let Some(proto) = args.proto {
        config.daemon.proto = proto;
    }

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    let begin = Instant::now();
    let client = DaemonClient::new(&config.daemon)?;

    match args.action {
        Action::Store {
            filename,
            container_id,
        } => {
            tracing::info!(
                "Storing {}'s volume container as {}",
                container_id,
                filename.display()
            );
            let engine = BackupEngine::new(&client);
            let container = engine.resolve(&container_id)?;

            let file = File::create(&filename)
                .with_context(|| format!("Failed to create {}", filename.display()))?;
            let summary = engine.store_resolved(&container, BufWriter::new(file))?;

            if args.metrics {
                let metrics = StoreMetrics {
                    container: container_id,
                    duration: begin.elapsed(),
                    bytes: summary.bytes,
                    finished_at: chrono::Utc::now(),
                };
                print!("{}", metrics);
            }
        }
        Action::Restore { filename } => {
            tracing::info!("Restoring {}", filename.display());
            let file = File::open(&filename)
                .with_context(|| format!("Failed to open {}", filename.display()))?;

            RestoreEngine::new(&client)
                .preserve_ownership(config.restore.preserve_ownership)
                .restore(BufReader::new(file))?;
        }
    }

    Ok(())
}
