mod config;
mod metrics;
mod models;
mod monitor;
mod report;
mod rpc;

use clap::Parser;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{load_config, FileConfig, MonitorConfig, Overrides};
use crate::monitor::{Monitor, StopReason, SystemClock};
use crate::rpc::RpcClient;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "validator-monitor", about = "Monitor NEAR validators performance")]
struct Cli {
    /// Output only the performance info for the given validator
    #[arg(long = "val-id")]
    val_id: Option<String>,

    /// Output only the validator specific performance data
    #[arg(long)]
    quiet: bool,

    /// Run once then exit
    #[arg(long)]
    single_run: bool,

    /// Monitoring interval in seconds [default: 60]
    #[arg(long)]
    interval: Option<u64>,

    /// RPC host of the node [default: 127.0.0.1]
    #[arg(long)]
    rpc_host: Option<String>,

    /// RPC port of the node [default: 3030]
    #[arg(long)]
    rpc_port: Option<u16>,

    /// Optional TOML file with [rpc] and [monitor] sections
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            rpc_host: self.rpc_host.clone(),
            rpc_port: self.rpc_port,
            interval: self.interval,
            validator_id: self.val_id.clone(),
            quiet: self.quiet,
            single_run: self.single_run,
        }
    }
}

fn resolve_config(args: &Cli) -> Result<MonitorConfig, config::ConfigError> {
    let file = match &args.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    MonitorConfig::resolve(file, args.overrides())
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "off" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "unable to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(config.quiet);

    let client = RpcClient::new(&config.rpc_host, config.rpc_port)?;
    info!(url = client.url(), "rpc client ready");

    let mut monitor = Monitor::new(config, client, SystemClock, io::stdout());
    monitor.banner();

    match monitor.run(interrupted()).await {
        StopReason::Completed => info!("single run finished"),
        StopReason::Interrupted => info!("interrupted"),
    }

    Ok(())
}
