use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use dirmirror::{
    CancellationContext, ComparatorKind, Logger, Settings, SyncConfig, Synchronizer, Verbosity,
};

const DEFAULT_INTERVAL_MS: u64 = 60_000;
const DEFAULT_LOG_FILE: &str = "dirmirror.log";

/// Periodically mirror a source directory into a replica directory.
#[derive(Debug, Parser)]
#[command(name = "dirmirror", version, about)]
struct Cli {
    /// Source directory (authoritative)
    source: Option<PathBuf>,

    /// Replica directory (overwritten to match the source)
    replica: Option<PathBuf>,

    /// Milliseconds between synchronization cycles
    #[arg(short, long)]
    interval: Option<u64>,

    /// Log file, appended to
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// 0 = errors only, 1 = + important, 2 = everything
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=2))]
    verbosity: Option<u8>,

    /// Stop on the first error instead of carrying on
    #[arg(short, long)]
    fragile: bool,

    /// File comparison: NONE, Binary, MD5 or SHA256
    #[arg(short, long)]
    comparator: Option<String>,

    /// TOML settings file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
}

struct Resolved {
    config: SyncConfig,
    log_file: PathBuf,
    verbosity: Verbosity,
}

fn resolve(cli: Cli) -> Result<Resolved> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let source = cli
        .source
        .or(settings.source.clone())
        .ok_or_else(|| anyhow!("missing source directory"))?;
    let replica = cli
        .replica
        .or(settings.replica.clone())
        .ok_or_else(|| anyhow!("missing replica directory"))?;
    let interval = cli.interval.or(settings.interval_ms).unwrap_or(DEFAULT_INTERVAL_MS);
    let comparator = cli
        .comparator
        .as_deref()
        .map(ComparatorKind::parse)
        .or(settings.comparator)
        .unwrap_or_default();
    let fragile = cli.fragile || settings.fragile.unwrap_or(false);

    let config = SyncConfig::new(&source, &replica, interval, fragile, comparator)
        .context("Invalid synchronization settings")?
        .with_retry(settings.retry_policy());

    Ok(Resolved {
        config,
        log_file: cli
            .log_file
            .or(settings.log_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        verbosity: Verbosity::from(cli.verbosity.or(settings.verbosity).unwrap_or(1)),
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let resolved = match resolve(cli) {
        Ok(resolved) => resolved,
        Err(e) => {
            Logger::log_critical_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    let logger = match Logger::new(&resolved.log_file, resolved.verbosity) {
        Ok(logger) => Arc::new(logger),
        Err(e) => {
            Logger::log_critical_error(&format!("{:#}", anyhow::Error::from(e)));
            std::process::exit(1);
        }
    };

    let cancel = CancellationContext::new();
    let synchronizer = Synchronizer::new(resolved.config, Arc::clone(&logger), cancel.clone());

    let signal_cancel = cancel.clone();
    let signal_logger = Arc::clone(&logger);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_logger.log_important("Interrupt received, stopping after the current cycle");
            signal_cancel.cancel();
        }
    });

    let result = synchronizer.start().await;
    logger.shutdown();

    if let Err(e) = result {
        Logger::log_critical_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
