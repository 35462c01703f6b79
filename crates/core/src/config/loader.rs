//! Loading, environment overrides and validation.

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use super::WatcherConfig;
use crate::health::{HealthMonitorConfig, MonitoredWallets};
use crate::margin::MarginCallConfig;
use crate::position::{Wallet, WalletRole};

/// Environment variable holding the config file path.
pub const CONFIG_PATH_ENV: &str = "WATCHER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "watcher.toml";

/// Configuration with parsed addresses and derived monitor settings.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub network: String,
    pub private_node_url: String,
    pub public_node_url: String,
    pub public_node_timeout: Duration,
    pub private_node_timeout: Duration,
    /// `None` disables the health timer
    pub telegram_bot_token: Option<String>,
    pub telegram_timeout: Duration,
    pub mail_server_host: String,
    pub mail_api_key: String,
    pub mail_timeout: Duration,
    pub protocol: Address,
    pub price_feed: Address,
    /// Wallets of every role in configuration order
    pub wallets: Vec<Wallet>,
    pub max_concurrent: usize,
    pub health: HealthMonitorConfig,
    pub margin: MarginCallConfig,
}

impl ResolvedConfig {
    /// Wallet addresses grouped by role for the health monitor.
    pub fn monitored_wallets(&self) -> MonitoredWallets {
        let of = |role: WalletRole| {
            self.wallets
                .iter()
                .filter(|w| w.role == role)
                .map(|w| w.address)
                .collect()
        };
        MonitoredWallets {
            liquidator: of(WalletRole::Liquidator),
            rollover: of(WalletRole::Rollover),
            arbitrage: of(WalletRole::Arbitrage),
        }
    }
}

impl WatcherConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override secrets and endpoints from the environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Override fields from `lookup`; empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields: [(&str, &mut String); 6] = [
            ("TELEGRAM_BOT_TOKEN", &mut self.telegram.bot_token),
            ("TELEGRAM_CHANNEL_ID", &mut self.telegram.channel_id),
            ("MAIL_API_KEY", &mut self.mail.api_key),
            ("MAIL_SERVER_HOST", &mut self.mail.server_host),
            ("PRIVATE_NODE_URL", &mut self.nodes.private_url),
            ("PUBLIC_NODE_URL", &mut self.nodes.public_url),
        ];
        for (name, field) in fields {
            if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }
    }

    /// Validate and parse into a [`ResolvedConfig`].
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        if self.nodes.private_url.is_empty() {
            bail!("Private node URL not configured (nodes.private_url or PRIVATE_NODE_URL)");
        }
        if self.nodes.public_url.is_empty() {
            bail!("Public node URL not configured (nodes.public_url or PUBLIC_NODE_URL)");
        }
        if self.mail.server_host.is_empty() {
            bail!("Mail server host not configured (mail.server_host or MAIL_SERVER_HOST)");
        }
        if self.monitor.max_concurrent == 0 {
            bail!("monitor.max_concurrent must be at least 1");
        }
        for (field, secs) in [
            ("nodes.public_timeout_secs", self.nodes.public_timeout_secs),
            ("nodes.private_timeout_secs", self.nodes.private_timeout_secs),
            ("telegram.timeout_secs", self.telegram.timeout_secs),
            ("mail.timeout_secs", self.mail.timeout_secs),
        ] {
            if secs == 0 {
                bail!("{field} must be at least 1");
            }
        }
        // both monitors share one throttle, pruned on the margin-call cooldown
        if self.monitor.low_balance_alert_cooldown_secs > self.monitor.margin_call_cooldown_secs {
            bail!(
                "monitor.low_balance_alert_cooldown_secs ({}) must not exceed monitor.margin_call_cooldown_secs ({})",
                self.monitor.low_balance_alert_cooldown_secs,
                self.monitor.margin_call_cooldown_secs
            );
        }
        if self.monitor.margin_call_ratio_bps > 10_000 {
            bail!(
                "monitor.margin_call_ratio_bps must not exceed 10000, got {}",
                self.monitor.margin_call_ratio_bps
            );
        }

        let contracts = &self.contracts;
        let protocol = parse_address("contracts.protocol", &contracts.protocol)?;
        let price_feed = parse_address("contracts.price_feed", &contracts.price_feed)?;
        let btc_token = parse_address("contracts.btc_token", &contracts.btc_token)?;
        let usd_token = parse_address("contracts.usd_token", &contracts.usd_token)?;

        let mut wallets = Vec::new();
        for (role, addresses) in [
            (WalletRole::Liquidator, &self.wallets.liquidator),
            (WalletRole::Rollover, &self.wallets.rollover),
            (WalletRole::Arbitrage, &self.wallets.arbitrage),
        ] {
            for (i, raw) in addresses.iter().enumerate() {
                let address = parse_address(&format!("wallets.{role}[{i}]"), raw)?;
                wallets.push(Wallet::new(address, role));
            }
        }

        let monitor = &self.monitor;
        Ok(ResolvedConfig {
            network: self.network.name.clone(),
            private_node_url: self.nodes.private_url.clone(),
            public_node_url: self.nodes.public_url.clone(),
            public_node_timeout: self.nodes.public_timeout(),
            private_node_timeout: self.nodes.private_timeout(),
            telegram_bot_token: self
                .telegram
                .is_enabled()
                .then(|| self.telegram.bot_token.clone()),
            telegram_timeout: self.telegram.timeout(),
            mail_server_host: self.mail.server_host.clone(),
            mail_api_key: self.mail.api_key.clone(),
            mail_timeout: self.mail.timeout(),
            protocol,
            price_feed,
            wallets,
            max_concurrent: monitor.max_concurrent,
            health: HealthMonitorConfig {
                network: self.network.name.clone(),
                channel_id: self.telegram.channel_id.clone(),
                low_balance_threshold: monitor.low_balance_threshold,
                alert_cooldown: monitor.low_balance_alert_cooldown(),
                interval: monitor.health_interval(),
            },
            margin: MarginCallConfig {
                ratio_bps: monitor.margin_call_ratio_bps,
                cooldown: monitor.margin_call_cooldown(),
                scan_interval: monitor.margin_scan_interval(),
                trade_event_start_block: contracts.trade_event_start_block,
                btc_token,
                usd_token,
                maintenance_buffer: monitor.maintenance_buffer,
            },
        })
    }

    /// Log the effective configuration. Secrets are never logged.
    pub fn log_config(&self) {
        info!(
            network = %self.network.name,
            test_network = self.network.is_test(),
            "Watcher configuration loaded"
        );
        info!(
            private_node = %self.nodes.private_url,
            public_node = %self.nodes.public_url,
            mail_host = %self.mail.server_host,
            telegram = self.telegram.is_enabled(),
            "Endpoints"
        );
        info!(
            private_node_secs = self.nodes.private_timeout_secs,
            public_node_secs = self.nodes.public_timeout_secs,
            telegram_secs = self.telegram.timeout_secs,
            mail_secs = self.mail.timeout_secs,
            "Request timeouts"
        );
        info!(
            liquidator = self.wallets.liquidator.len(),
            rollover = self.wallets.rollover.len(),
            arbitrage = self.wallets.arbitrage.len(),
            "Monitored wallets"
        );
        info!(
            health_interval_secs = self.monitor.health_interval_secs,
            margin_scan_interval_secs = self.monitor.margin_scan_interval_secs,
            low_balance_threshold = self.monitor.low_balance_threshold,
            low_balance_alert_cooldown_secs = self.monitor.low_balance_alert_cooldown_secs,
            margin_call_cooldown_secs = self.monitor.margin_call_cooldown_secs,
            margin_call_ratio_bps = self.monitor.margin_call_ratio_bps,
            max_concurrent = self.monitor.max_concurrent,
            "Monitor parameters"
        );
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    if value.is_empty() {
        bail!("{field} not configured");
    }
    value
        .parse()
        .with_context(|| format!("Invalid address in {field}: '{value}'"))
}

/// Load configuration from `WATCHER_CONFIG` (default `watcher.toml`) and
/// apply environment overrides.
///
/// A missing default file falls back to built-in defaults; a missing file
/// named explicitly is an error.
pub fn load_from_env() -> Result<WatcherConfig> {
    let explicit = std::env::var(CONFIG_PATH_ENV).ok();
    let path = explicit.clone().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut config = if Path::new(&path).exists() {
        WatcherConfig::from_file(&path)?
    } else if explicit.is_some() {
        bail!("Config file {path} named by {CONFIG_PATH_ENV} does not exist");
    } else {
        warn!(path = %path, "Config file not found, using defaults");
        WatcherConfig::default()
    };

    config.apply_env_overrides();
    Ok(config)
}
