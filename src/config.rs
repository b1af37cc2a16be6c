//! Configuration loading and validation
//!
//! Settings come from a TOML file layered with `COPYWATCH_`-prefixed
//! environment variables. Validation failures are fatal at startup: a bad
//! wallet address or negative threshold must never reach the poll loop.

use crate::error::{MonitorError, Result};
use serde::Deserialize;

/// A followed wallet
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Polygon address (0x + 40 hex chars)
    pub address: String,
    /// Display name used in alerts
    pub name: String,
    /// Only alert once the net position reaches this many shares
    #[serde(default)]
    pub min_shares: Option<i64>,
    /// Optional Polymarket profile URL, rendered as a hyperlink
    #[serde(default)]
    pub profile_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Alert-routing and conviction thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    /// Minimum % stake change to trigger an update
    #[serde(default = "default_min_update_pct")]
    pub min_update_pct: f64,
    /// Minimum absolute $ change to trigger an update
    #[serde(default = "default_min_update_abs")]
    pub min_update_abs: f64,
    /// Age after which an outstanding message gets a fresh message instead of an edit
    #[serde(default = "default_stale_secs")]
    pub stale_threshold_secs: i64,
    /// Portfolio value cache TTL
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: i64,
    /// Bet size as a fraction of cached portfolio that invalidates the cache
    #[serde(default = "default_invalidation")]
    pub invalidation_threshold: f64,
    #[serde(default = "default_extreme")]
    pub conviction_extreme_pct: f64,
    #[serde(default = "default_high")]
    pub conviction_high_pct: f64,
    #[serde(default = "default_medium")]
    pub conviction_medium_pct: f64,
    #[serde(default = "default_low")]
    pub conviction_low_pct: f64,
    /// Deadband preventing conviction label flapping at tier boundaries
    #[serde(default = "default_hysteresis")]
    pub conviction_hysteresis_pct: f64,
    /// Minimum seconds between state file writes
    #[serde(default = "default_debounce")]
    pub debounce_secs: i64,
}

fn default_min_update_pct() -> f64 {
    5.0
}
fn default_min_update_abs() -> f64 {
    100.0
}
fn default_stale_secs() -> i64 {
    1800
}
fn default_cache_ttl() -> i64 {
    3600
}
fn default_invalidation() -> f64 {
    0.10
}
fn default_extreme() -> f64 {
    10.0
}
fn default_high() -> f64 {
    5.0
}
fn default_medium() -> f64 {
    2.0
}
fn default_low() -> f64 {
    0.5
}
fn default_hysteresis() -> f64 {
    0.2
}
fn default_debounce() -> i64 {
    10
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_update_pct: default_min_update_pct(),
            min_update_abs: default_min_update_abs(),
            stale_threshold_secs: default_stale_secs(),
            cache_ttl_secs: default_cache_ttl(),
            invalidation_threshold: default_invalidation(),
            conviction_extreme_pct: default_extreme(),
            conviction_high_pct: default_high(),
            conviction_medium_pct: default_medium(),
            conviction_low_pct: default_low(),
            conviction_hysteresis_pct: default_hysteresis(),
            debounce_secs: default_debounce(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataApiConfig {
    #[serde(default = "default_data_api_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

fn default_data_api_url() -> String {
    "https://data-api.polymarket.com".to_string()
}
fn default_timeout() -> u64 {
    10
}
fn default_retries() -> u32 {
    3
}

impl Default for DataApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_data_api_url(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub wallets: Vec<WalletConfig>,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub data_api: DataApiConfig,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

fn default_poll_interval() -> u64 {
    30
}
fn default_state_file() -> String {
    "copywatch_state.json".to_string()
}

impl Config {
    /// Load from a TOML file, layered with `COPYWATCH_`-prefixed env vars.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("COPYWATCH").separator("__"))
            .build()
            .map_err(|e| MonitorError::Config(e.to_string()))?;

        let mut cfg: Config = settings
            .try_deserialize()
            .map_err(|e| MonitorError::Config(e.to_string()))?;

        cfg.state_file = shellexpand::tilde(&cfg.state_file).into_owned();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Fail fast on configuration the poll loop cannot safely run with.
    pub fn validate(&self) -> Result<()> {
        if self.wallets.is_empty() {
            return Err(MonitorError::Config("no wallets configured".into()));
        }
        for wallet in &self.wallets {
            if !is_valid_address(&wallet.address) {
                return Err(MonitorError::InvalidWallet(wallet.address.clone()));
            }
            if let Some(min) = wallet.min_shares {
                if min < 0 {
                    return Err(MonitorError::Config(format!(
                        "min_shares must be non-negative for {}, got {}",
                        wallet.name, min
                    )));
                }
            }
        }
        if self.thresholds.min_update_pct < 0.0 || self.thresholds.min_update_abs < 0.0 {
            return Err(MonitorError::Config(
                "update thresholds must be non-negative".into(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(MonitorError::Config("poll_interval_secs must be > 0".into()));
        }
        Ok(())
    }

    /// min_shares threshold for a wallet, if one is configured
    pub fn min_shares_for(&self, wallet: &str) -> Option<i64> {
        let wallet = wallet.to_lowercase();
        self.wallets
            .iter()
            .find(|w| w.address.to_lowercase() == wallet)
            .and_then(|w| w.min_shares)
    }
}

fn is_valid_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}
