//! Gamecha main entry point
//!
//! This is the command-line interface for the Gamecha metadata harvester.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use gamecha::config::{load_config_with_hash, Config};
use gamecha::query::Querier;
use gamecha::seeker;
use gamecha::storage::{open_store, GameStore};
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Gamecha: incremental storefront metadata harvester
///
/// Gamecha diffs the platform catalog against the one saved by the previous
/// run and fetches details only for titles it has not seen yet.
#[derive(Parser, Debug)]
#[command(name = "gamecha")]
#[command(version)]
#[command(about = "Incremental storefront metadata harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "gamecha.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh catalogs and harvest details of newly seen titles
    Seeker,

    /// Inspect harvested data
    #[command(subcommand)]
    Query(QueryCommand),
}

#[derive(Subcommand, Debug)]
enum QueryCommand {
    /// List every stored record of a platform
    List(PlatformArgs),

    /// Show one stored record
    Show {
        #[command(flatten)]
        platform: PlatformArgs,

        /// Title id on the platform
        #[arg(long)]
        id: String,
    },

    /// List the persisted catalog of a platform
    Catalog(PlatformArgs),
}

#[derive(Args, Debug)]
struct PlatformArgs {
    /// Platform name, e.g. "steam"
    #[arg(long)]
    platform: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let store = open_store(&config.store).context("failed to open store")?;

    let result = match cli.command {
        Command::Seeker => handle_seeker(&config, store.clone()).await,
        Command::Query(query) => handle_query(query, store.as_ref()),
    };

    if let Err(e) = store.close() {
        tracing::warn!("Failed to close store: {}", e);
    }

    result
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gamecha=info,warn"),
            1 => EnvFilter::new("gamecha=debug,info"),
            2 => EnvFilter::new("gamecha=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Runs the configured seekers until done or interrupted
async fn handle_seeker(config: &Config, store: Arc<dyn GameStore>) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let watcher = tokio::spawn(watch_interrupt(cancel.clone(), tokio::signal::ctrl_c()));

    let result = seeker::run(&cancel, &config.seeker, store).await;
    cancel.cancel();
    let _ = watcher.await;

    match result {
        Ok(Some(summary)) => {
            tracing::info!(
                "Seeking finished: {} seeded, {} fetched, {} skipped, {} saved",
                summary.seeded,
                summary.fetched,
                summary.skipped,
                summary.saved
            );
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => {
            tracing::error!("Seeking failed: {}", e);
            Err(e.into())
        }
    }
}

/// Cancels the run when `signal` fires
///
/// If the listener cannot be installed the run carries on uninterruptible and
/// the watcher just waits for the run to finish.
async fn watch_interrupt<F>(cancel: CancellationToken, signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        signaled = signal => match signaled {
            Ok(()) => {
                tracing::info!("Signaled to terminate");
                cancel.cancel();
            }
            Err(e) => {
                tracing::warn!("Failed to listen for interrupt: {}", e);
                cancel.cancelled().await;
            }
        },
        _ = cancel.cancelled() => {}
    }
}

/// Handles the read-only query subcommands
fn handle_query(query: QueryCommand, store: &dyn GameStore) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match query {
        QueryCommand::List(args) => {
            Querier::new(store, args.platform).list(&mut out)?;
        }
        QueryCommand::Show { platform, id } => {
            Querier::new(store, platform.platform).show(&id, &mut out)?;
        }
        QueryCommand::Catalog(args) => {
            Querier::new(store, args.platform).catalog(&mut out)?;
        }
    }

    out.flush()?;
    Ok(())
}
