use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use snapsync::fs::{JsonFileStore, LocalStore, ObjectStore, OpendalStore};
use snapsync::sync::{
    Direction, SnapshotSource, StoreSnapshotSource, SyncCoordinator, SyncMetadata, SyncResult,
};
use snapsync::SyncConfig;

#[derive(Parser)]
#[command(name = "snapsync", version, about = "Sync a local application snapshot with an S3 bucket")]
struct Cli {
    /// Config file (defaults to <config dir>/snapsync/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile local state with the bucket
    Sync {
        /// Push local state regardless of metadata
        #[arg(long, conflicts_with = "download")]
        upload: bool,
        /// Pull remote state regardless of metadata
        #[arg(long)]
        download: bool,
    },
    /// Show local and remote sync metadata
    Status,
    /// Test connectivity to the bucket
    Check,
    /// Print this device's identifier
    DeviceId,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "snapsync=debug" } else { "snapsync=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<SyncConfig> {
    let path = path
        .or_else(SyncConfig::default_path)
        .context("No config path given and no config directory available")?;
    SyncConfig::load(&path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config)?;
    let file_store = Arc::new(JsonFileStore::open(config.resolved_store_path())?);
    let store_path = file_store.path().display().to_string();
    let local: Arc<dyn LocalStore> = file_store;
    let remote: Arc<dyn ObjectStore> = Arc::new(OpendalStore::from_config(&config)?);
    let source: Arc<dyn SnapshotSource> = Arc::new(StoreSnapshotSource::new(local.clone()));

    match cli.command {
        Command::Check => {
            remote
                .test_connection()
                .await
                .with_context(|| format!("Cannot reach {}", remote.display_path(&config.prefix)))?;
            println!(
                "{} {} via {}",
                "✓".green(),
                remote.display_path(&config.prefix),
                remote.backend_type().describe()
            );
        }
        Command::DeviceId => {
            let coordinator = SyncCoordinator::new(remote, local, source, &config);
            println!("{}", coordinator.device_id().await);
        }
        Command::Status => {
            let remote_backend = remote.backend_type();
            let coordinator = SyncCoordinator::connect(remote, local, source, &config).await?;
            let report = coordinator.status().await?;
            println!("{:<8} {}", "Backend".bold(), remote_backend.describe());
            println!("{:<8} {}", "Store".bold(), store_path);
            print_metadata("Local", report.local.as_ref());
            print_metadata("Remote", report.remote.as_ref());
            println!("{:<8} {}", "Current".bold(), report.current_hash);
            println!(
                "{:<8} {} ({})",
                "Next".bold(),
                report.pending.direction.to_string().cyan(),
                report.pending.reason.description()
            );
        }
        Command::Sync { upload, download } => {
            let forced = match (upload, download) {
                (true, _) => Some(Direction::Upload),
                (_, true) => Some(Direction::Download),
                _ => None,
            };
            let coordinator = SyncCoordinator::connect(remote, local, source, &config).await?;
            let result = coordinator.sync(forced).await;
            print_result(&result);
            if !result.success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_metadata(label: &str, meta: Option<&SyncMetadata>) {
    match meta {
        Some(meta) => {
            let when = chrono::DateTime::from_timestamp_millis(meta.last_sync_time)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| meta.last_sync_time.to_string());
            println!(
                "{:<8} {} by {} ({} files, hash {})",
                label.bold(),
                when,
                meta.device_id,
                meta.files.len(),
                meta.data_hash
            );
        }
        None => println!("{:<8} {}", label.bold(), "never synced".dimmed()),
    }
}

fn print_result(result: &SyncResult) {
    let mark = if result.success { "✓".green() } else { "✗".red() };
    println!("{} {}", mark, result.message);
    for err in &result.errors {
        println!("  {} {}", "-".red(), err);
    }
}
