//! Configuration management for the orchestrator
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tx::gas::{CONTRACT_GAS_LIMIT, MIN_TRANSFER_GAS, TRANSFER_GAS_LIMIT};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "ORCHESTRATOR_CONFIG";

/// Config file used when nothing else is specified
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub node: NodeConfig,
    pub wallet: WalletConfig,
    pub gas: GasConfig,
    pub artifacts: ArtifactsConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub rpc_url: String,
    /// Expected chain id; queried from the node when absent
    pub chain_id: Option<u64>,
    pub poll_interval_ms: u64,
    pub confirmation_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Name of the environment variable holding the hex private key
    pub private_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub transfer_gas_limit: u64,
    pub contract_gas_limit: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub abi_path: PathBuf,
    pub bytecode_path: PathBuf,
    pub contract_address_path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: None,
            poll_interval_ms: 2_000,
            confirmation_timeout_secs: 300,
        }
    }
}

impl NodeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: "PRIVATE_KEY".to_string(),
        }
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            transfer_gas_limit: TRANSFER_GAS_LIMIT,
            contract_gas_limit: CONTRACT_GAS_LIMIT,
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            abi_path: PathBuf::from("build/Counter.abi"),
            bytecode_path: PathBuf::from("build/Counter.bin"),
            contract_address_path: PathBuf::from("contract_address.txt"),
        }
    }
}

impl Settings {
    /// Load settings from an explicit path, `ORCHESTRATOR_CONFIG`, or the
    /// default location. Falls back to built-in defaults when no file was
    /// requested and the default file does not exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let requested = explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let config_path = match requested {
            Some(path) => path,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    tracing::debug!("No config file found, using defaults");
                    let settings = Settings::default();
                    settings.validate()?;
                    return Ok(settings);
                }
                default
            }
        };

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    /// Parse settings from TOML text
    pub fn from_toml(input: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(input);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.node.rpc_url.trim().is_empty() {
            anyhow::bail!("node.rpc_url must not be empty");
        }
        if self.node.poll_interval_ms == 0 {
            anyhow::bail!("node.poll_interval_ms must be positive");
        }
        if self.node.confirmation_timeout_secs == 0 {
            anyhow::bail!("node.confirmation_timeout_secs must be positive");
        }
        if self.gas.transfer_gas_limit < MIN_TRANSFER_GAS
            || self.gas.contract_gas_limit < MIN_TRANSFER_GAS
        {
            anyhow::bail!("gas limits must be at least {}", MIN_TRANSFER_GAS);
        }
        if self.wallet.private_key_env.is_empty() {
            tracing::warn!("wallet.private_key_env is empty - signing commands will fail");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");
    }

    ENV_VAR
        .replace_all(input, |cap: &regex::Captures<'_>| {
            env::var(&cap[1]).unwrap_or_default()
        })
        .into_owned()
}
