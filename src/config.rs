use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 3030;
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Quiet mode can only be used when a validator ID is specified")]
    QuietWithoutValidator,

    #[error("Monitoring interval must be at least one second")]
    ZeroInterval,

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Deserialize, Debug, Default)]
pub struct RpcSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Deserialize, Debug, Default)]
pub struct MonitorSection {
    pub interval: Option<u64>,
    pub val_id: Option<String>,
}

/// Optional TOML layer underneath the command line flags.
#[derive(Deserialize, Debug, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub rpc: RpcSection,
    #[serde(default)]
    pub monitor: MonitorSection,
}

pub fn parse_config(config_str: &str) -> Result<FileConfig, ConfigError> {
    Ok(toml::from_str(config_str)?)
}

pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let config_str = fs::read_to_string(path)?;
    parse_config(&config_str)
}

/// Flags as given on the command line; `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub rpc_host: Option<String>,
    pub rpc_port: Option<u16>,
    pub interval: Option<u64>,
    pub validator_id: Option<String>,
    pub quiet: bool,
    pub single_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub rpc_host: String,
    pub rpc_port: u16,
    pub interval: Duration,
    pub validator_id: Option<String>,
    pub quiet: bool,
    pub single_run: bool,
}

impl MonitorConfig {
    pub fn resolve(file: FileConfig, cli: Overrides) -> Result<Self, ConfigError> {
        // An empty id means "no target": fleet mode, and quiet is refused.
        let validator_id = cli
            .validator_id
            .or(file.monitor.val_id)
            .filter(|id| !id.is_empty());
        if cli.quiet && validator_id.is_none() {
            return Err(ConfigError::QuietWithoutValidator);
        }

        let interval = cli
            .interval
            .or(file.monitor.interval)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        Ok(Self {
            rpc_host: cli
                .rpc_host
                .or(file.rpc.host)
                .unwrap_or_else(|| DEFAULT_RPC_HOST.to_string()),
            rpc_port: cli.rpc_port.or(file.rpc.port).unwrap_or(DEFAULT_RPC_PORT),
            interval: Duration::from_secs(interval),
            validator_id,
            quiet: cli.quiet,
            single_run: cli.single_run,
        })
    }
}
