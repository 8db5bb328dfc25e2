//! # nestbench CLI
//!
//! Runs one benchmark against the target and prints the result document on
//! stdout. Logs and the latency table go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use nestbench_loadtest::{BenchConfig, BenchRunner, LogFormat};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "nestbench")]
#[command(version)]
#[command(about = "Load generator and correctness checker for the estate search service")]
#[command(long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "NESTBENCH_CONFIG")]
    config: Option<PathBuf>,

    /// Target base URL
    #[arg(long)]
    target_url: Option<String>,

    /// Host header to send instead of the URL's authority
    #[arg(long)]
    target_host: Option<String>,

    /// Directory holding result/*.txt fixtures and snapshots
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory holding the search condition documents
    #[arg(long)]
    fixture_dir: Option<PathBuf>,

    /// Load phase duration in seconds
    #[arg(long)]
    load_secs: Option<u64>,

    /// Enable debug logs
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(BenchConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::from_file(path)?,
            None => BenchConfig::default(),
        };
        if let Some(url) = self.target_url {
            config.target.url = url;
        }
        if let Some(host) = self.target_host {
            config.target.host_override = Some(host);
        }
        if let Some(dir) = self.data_dir {
            config.paths.data_dir = dir;
        }
        if let Some(dir) = self.fixture_dir {
            config.paths.fixture_dir = dir;
        }
        if let Some(secs) = self.load_secs {
            config.parameters.load_timeout_secs = secs;
        }
        Ok((config, self.verbose))
    }
}

fn init_logging(config: &BenchConfig, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, verbose) = Cli::parse().into_config()?;
    init_logging(&config, verbose);

    info!(target_url = %config.target.url, "nestbench v{}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            interrupt.cancel();
        }
    });

    let report = BenchRunner::new(config)
        .run(&cancel)
        .await
        .context("benchmark could not start")?;

    report.metrics.print_report();
    report.result.print_summary();
    println!("{}", report.result.to_json()?);
    Ok(())
}
