use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod config;
mod database;
mod monitoring;
mod orchestrator;
mod pool;
#[cfg(test)]
mod testing;

use config::Config;
use database::{LibsqlResultSink, ResultSink};
use monitoring::TcpConnector;
use orchestrator::Orchestrator;

/// Extra time granted to in-flight probes on top of the check timeout
const SHUTDOWN_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(version, about = "Periodically probes database endpoints and records reachability")]
struct Cli {
    /// Path to the TOML config (defaults to $XDG_CONFIG_HOME/dbwatch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the monitor until interrupted (default)
    Run,
    /// Show the latest stored results for one database
    History {
        /// Configured db_name
        #[arg(long)]
        target: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Delete stored results older than the retention window
    Cleanup {
        /// Overrides storage.retention_days
        #[arg(long)]
        days: Option<u32>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_tracing_with(logger::level_from_verbosity(cli.verbose));

    let config = Config::from_config(cli.config.as_ref()).context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::History { target, limit, json } => history(&config, &target, limit, json).await,
        Command::Cleanup { days } => cleanup(&config, days).await,
        Command::Config => {
            print!("{config}");
            Ok(())
        }
    }
}

async fn open_sink(config: &Config) -> Result<LibsqlResultSink> {
    let pool = pool::open_local(&config.storage.path, config.storage.pool_size)
        .await
        .with_context(|| format!("failed to open {}", config.storage.path.display()))?;
    LibsqlResultSink::new(pool).await
}

async fn run(config: Config) -> Result<()> {
    let sink = Arc::new(open_sink(&config).await?);
    let orchestrator = Arc::new(Orchestrator::new(&config, sink, Arc::new(TcpConnector::new())));
    let cancel = CancellationToken::new();

    let mut service = {
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.start(cancel).await })
    };

    let finished = tokio::select! {
        _ = shutdown_signal() => None,
        joined = &mut service => Some(joined),
    };
    cancel.cancel();

    let outcome = match finished {
        Some(joined) => joined,
        None => {
            info!("Shutting down...");
            service.await
        }
    };

    let grace = shutdown_grace(config.monitor.timeout);
    if tokio::time::timeout(grace, orchestrator.shutdown()).await.is_err() {
        warn!(grace_secs = grace.as_secs(), "Timed out waiting for monitor tasks to drain");
    }

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!("Service error: {:#}", e);
            Err(e)
        }
        Err(e) => Err(anyhow!("monitor service task failed: {e}")),
    }
}

/// How long shutdown may wait for in-flight probes
fn shutdown_grace(timeout_secs: u64) -> Duration {
    Duration::from_secs(timeout_secs).saturating_add(SHUTDOWN_SLACK)
}

async fn history(config: &Config, target: &str, limit: usize, json: bool) -> Result<()> {
    let sink = open_sink(config).await?;
    let rows = sink.recent_results(target, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No results recorded for {target}");
        return Ok(());
    }

    for row in rows {
        let status = if row.status { "up" } else { "down" };
        let response_time = row.response_time.map_or_else(|| "-".to_string(), |t| format!("{t:.3}s"));
        println!(
            "{}  {:<4}  {:>9}  {}",
            row.check_time.format("%Y-%m-%d %H:%M:%S"),
            status,
            response_time,
            row.error.unwrap_or_default()
        );
    }
    Ok(())
}

async fn cleanup(config: &Config, days: Option<u32>) -> Result<()> {
    let days = days
        .or(config.storage.retention_days)
        .ok_or_else(|| anyhow!("no retention window: pass --days or set storage.retention_days"))?;

    let sink = open_sink(config).await?;
    let deleted = sink.cleanup_old_data(days).await?;
    println!("Deleted {deleted} results older than {days} days");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_is_the_default_command() {
        let cli = Cli::try_parse_from(["dbwatch", "-c", "/etc/dbwatch.toml", "-vv"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/dbwatch.toml")));
    }

    #[test]
    fn shutdown_grace_adds_slack_without_overflowing() {
        assert_eq!(shutdown_grace(30), Duration::from_secs(35));
        assert_eq!(shutdown_grace(u64::MAX), Duration::MAX);
    }

    #[test]
    fn history_arguments() {
        let cli = Cli::try_parse_from(["dbwatch", "history", "--target", "orders", "--json"]).unwrap();
        match cli.command {
            Some(Command::History { target, limit, json }) => {
                assert_eq!(target, "orders");
                assert_eq!(limit, 20);
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
