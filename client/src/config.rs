//! Client configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::time::Duration;

use crate::addresses::{self, ProgramAddresses};
use crate::live::LiveConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// RPC URL for Solana cluster
    pub rpc_url: String,

    /// WebSocket URL for account subscriptions
    pub ws_url: String,

    /// AMM pool (amm id) to watch and trade against
    #[serde(with = "addresses::base58")]
    pub pool_address: Pubkey,

    /// Wallet keypair path
    pub keypair_path: String,

    /// Commitment used for reads and confirmation
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Priority fee in micro-lamports per compute unit
    #[serde(default = "default_compute_unit_price")]
    pub compute_unit_price: u64,

    #[serde(default = "default_compute_unit_limit")]
    pub compute_unit_limit: u32,

    /// Pending account notifications kept before the oldest is dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Minimum gap between two reserve refreshes
    #[serde(default = "default_min_refresh_interval_ms")]
    pub min_refresh_interval_ms: u64,

    /// Trade size used to compute the published price
    #[serde(default = "default_virtual_amount")]
    pub virtual_amount: f64,

    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,

    /// Extra attempts for the LP lock ratio probe
    #[serde(default)]
    pub lp_probe_max_retries: u32,

    /// Wait before the first LP probe retry; doubles on each further retry
    #[serde(default = "default_lp_probe_backoff_ms")]
    pub lp_probe_backoff_ms: u64,

    #[serde(default)]
    pub programs: ProgramAddresses,
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_compute_unit_price() -> u64 {
    25_000
}

fn default_compute_unit_limit() -> u32 {
    600_000
}

fn default_queue_capacity() -> usize {
    100
}

fn default_min_refresh_interval_ms() -> u64 {
    100
}

fn default_virtual_amount() -> f64 {
    1.0
}

fn default_confirm_timeout_secs() -> u64 {
    60
}

fn default_lp_probe_backoff_ms() -> u64 {
    200
}

impl Config {
    /// Load configuration from TOML file
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("SOLDEX_CONFIG").unwrap_or_else(|_| "soldex.toml".to_string());
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .context(format!("Failed to read config file: {}", config_path))?;

        let config: Config = toml::from_str(&config_str).context("Failed to parse config TOML")?;

        Ok(config)
    }

    /// Create default configuration
    pub fn default_mainnet() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            ws_url: "wss://api.mainnet-beta.solana.com".to_string(),
            // RAY/SOL
            pool_address: solana_sdk::pubkey!("AVs9TA4nWDzfPJE9gGVNJMVhcQy3V9PGazuz33BfG2RA"),
            keypair_path: "~/.config/solana/id.json".to_string(),
            commitment: default_commitment(),
            compute_unit_price: default_compute_unit_price(),
            compute_unit_limit: default_compute_unit_limit(),
            queue_capacity: default_queue_capacity(),
            min_refresh_interval_ms: default_min_refresh_interval_ms(),
            virtual_amount: default_virtual_amount(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
            lp_probe_max_retries: 0,
            lp_probe_backoff_ms: default_lp_probe_backoff_ms(),
            programs: ProgramAddresses::mainnet(),
        }
    }

    /// Write default config to file
    pub fn write_default(path: &str) -> Result<()> {
        let config = Self::default_mainnet();
        let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;

        std::fs::write(path, toml_str).context(format!("Failed to write config to {}", path))?;

        log::info!("Created default config at {}", path);
        Ok(())
    }

    /// Parsed commitment level, falling back to confirmed
    pub fn commitment_config(&self) -> CommitmentConfig {
        self.commitment
            .parse()
            .unwrap_or_else(|_| CommitmentConfig::confirmed())
    }

    pub fn live_config(&self) -> LiveConfig {
        LiveConfig {
            queue_capacity: self.queue_capacity,
            min_refresh_interval: Duration::from_millis(self.min_refresh_interval_ms),
            virtual_amount: self.virtual_amount,
        }
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn lp_probe_backoff(&self) -> Duration {
        Duration::from_millis(self.lp_probe_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_mainnet();
        assert_eq!(config.rpc_url, "https://api.mainnet-beta.solana.com");
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.live_config().min_refresh_interval, Duration::from_millis(100));
        assert_eq!(config.commitment_config(), CommitmentConfig::confirmed());
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            rpc_url = "http://localhost:8899"
            ws_url = "ws://localhost:8900"
            pool_address = "AVs9TA4nWDzfPJE9gGVNJMVhcQy3V9PGazuz33BfG2RA"
            keypair_path = "~/id.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.virtual_amount, 1.0);
        assert_eq!(config.min_refresh_interval_ms, 100);
        assert_eq!(config.lp_probe_max_retries, 0);
        assert_eq!(config.lp_probe_backoff(), Duration::from_millis(200));
        assert_eq!(config.programs, ProgramAddresses::mainnet());
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default_mainnet()).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.pool_address, Config::default_mainnet().pool_address);
        assert_eq!(back.programs, ProgramAddresses::mainnet());
    }
}
