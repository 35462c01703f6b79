//! Watcher configuration as read from TOML.
//!
//! Every field has a default so a partial file (or none at all, when the
//! environment supplies the endpoints) is enough to start.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::health::TEST_NETWORK;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default)]
    pub network: NetworkConfig,

    /// Node endpoints
    #[serde(default)]
    pub nodes: NodesConfig,

    /// Internal chat channel
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Margin-call mail service
    #[serde(default)]
    pub mail: MailConfig,

    /// Contract and token addresses
    #[serde(default)]
    pub contracts: ContractsConfig,

    /// Operator wallets per role
    #[serde(default)]
    pub wallets: WalletsConfig,

    /// Monitor timing and thresholds
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network name; `"test"` disables health checks
    #[serde(default = "default_network_name")]
    pub name: String,
}

fn default_network_name() -> String {
    "mainnet".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: default_network_name(),
        }
    }
}

impl NetworkConfig {
    pub fn is_test(&self) -> bool {
        self.name == TEST_NETWORK
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodesConfig {
    /// Trusted node (block height, balances, logs, price feed)
    #[serde(default)]
    pub private_url: String,

    /// Public node, queried with raw `eth_blockNumber`
    #[serde(default)]
    pub public_url: String,

    /// Timeout for the public node request (seconds)
    #[serde(default = "default_public_timeout")]
    pub public_timeout_secs: u64,

    /// Timeout for each private node request (seconds)
    #[serde(default = "default_private_timeout")]
    pub private_timeout_secs: u64,
}

fn default_public_timeout() -> u64 {
    10
}
fn default_private_timeout() -> u64 {
    30
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self {
            private_url: String::new(),
            public_url: String::new(),
            public_timeout_secs: default_public_timeout(),
            private_timeout_secs: default_private_timeout(),
        }
    }
}

impl NodesConfig {
    pub fn public_timeout(&self) -> Duration {
        Duration::from_secs(self.public_timeout_secs)
    }
    pub fn private_timeout(&self) -> Duration {
        Duration::from_secs(self.private_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token; empty disables the health timer
    #[serde(default)]
    pub bot_token: String,

    #[serde(default)]
    pub channel_id: String,

    /// Timeout for each Bot API request (seconds)
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_notify_timeout() -> u64 {
    10
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel_id: String::new(),
            timeout_secs: default_notify_timeout(),
        }
    }
}

impl TelegramConfig {
    pub fn is_enabled(&self) -> bool {
        !self.bot_token.is_empty()
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub server_host: String,

    #[serde(default)]
    pub api_key: String,

    /// Timeout for each mail service request (seconds)
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            server_host: String::new(),
            api_key: String::new(),
            timeout_secs: default_notify_timeout(),
        }
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Lending protocol emitting `Trade` events
    #[serde(default)]
    pub protocol: String,

    #[serde(default)]
    pub price_feed: String,

    #[serde(default)]
    pub btc_token: String,

    #[serde(default)]
    pub usd_token: String,

    /// First block searched for trade events
    #[serde(default = "default_trade_event_start_block")]
    pub trade_event_start_block: u64,
}

fn default_trade_event_start_block() -> u64 {
    1_205_639
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            protocol: String::new(),
            price_feed: String::new(),
            btc_token: String::new(),
            usd_token: String::new(),
            trade_event_start_block: default_trade_event_start_block(),
        }
    }
}

/// Wallet addresses in selection order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletsConfig {
    #[serde(default)]
    pub liquidator: Vec<String>,

    #[serde(default)]
    pub rollover: Vec<String>,

    #[serde(default)]
    pub arbitrage: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Health timer period (seconds)
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,

    /// Sleep between margin-call passes (seconds)
    #[serde(default = "default_margin_scan_interval")]
    pub margin_scan_interval_secs: u64,

    /// Balance alert threshold (native units)
    #[serde(default = "default_low_balance_threshold")]
    pub low_balance_threshold: f64,

    /// Minimum interval between two alerts for one wallet (seconds);
    /// 0 alerts on every check
    #[serde(default)]
    pub low_balance_alert_cooldown_secs: u64,

    /// Minimum interval between margin calls to one user (seconds)
    #[serde(default = "default_margin_call_cooldown")]
    pub margin_call_cooldown_secs: u64,

    /// Trigger ratio in basis points of the maintenance margin
    #[serde(default = "default_margin_call_ratio")]
    pub margin_call_ratio_bps: u32,

    /// In-flight operations per wallet
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Buffer used by the liquidation price estimate
    #[serde(default = "default_maintenance_buffer")]
    pub maintenance_buffer: f64,
}

fn default_health_interval() -> u64 {
    60
}
fn default_margin_scan_interval() -> u64 {
    300
}
fn default_low_balance_threshold() -> f64 {
    0.001
}
fn default_margin_call_cooldown() -> u64 {
    3 * 60 * 60
}
fn default_margin_call_ratio() -> u32 {
    9000
}
fn default_max_concurrent() -> usize {
    crate::wallet_queue::MAX_CONCURRENT
}
fn default_maintenance_buffer() -> f64 {
    0.15
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            health_interval_secs: default_health_interval(),
            margin_scan_interval_secs: default_margin_scan_interval(),
            low_balance_threshold: default_low_balance_threshold(),
            low_balance_alert_cooldown_secs: 0,
            margin_call_cooldown_secs: default_margin_call_cooldown(),
            margin_call_ratio_bps: default_margin_call_ratio(),
            max_concurrent: default_max_concurrent(),
            maintenance_buffer: default_maintenance_buffer(),
        }
    }
}

impl MonitorConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }
    pub fn margin_scan_interval(&self) -> Duration {
        Duration::from_secs(self.margin_scan_interval_secs)
    }
    pub fn margin_call_cooldown(&self) -> Duration {
        Duration::from_secs(self.margin_call_cooldown_secs)
    }
    pub fn low_balance_alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.low_balance_alert_cooldown_secs)
    }
}
