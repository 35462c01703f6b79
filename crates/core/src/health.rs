//! System health checks and low-balance alerts.
//!
//! Every check gathers a fresh [`HealthSignals`] snapshot. A failing
//! provider never aborts the check: its value becomes
//! [`Signal::Unavailable`] and the rest of the snapshot is still produced.
//! Low-balance alerts go to the internal chat channel through the shared
//! [`NotificationThrottle`]. The default cooldown is zero, so an alert is
//! repeated on every check while the condition lasts.

use alloy::primitives::Address;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::position::WalletRole;
use crate::signals::{HealthSignals, Signal, WalletBalances};
use crate::throttle::NotificationThrottle;
use watcher_api::ChatAlerter;
use watcher_chain::units::wei_to_decimal;
use watcher_chain::{BalanceSource, BlockHeightSource};

/// Network name that disables health checks.
pub const TEST_NETWORK: &str = "test";

/// Health monitor settings.
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    /// Network name, used in alert text
    pub network: String,
    /// Chat channel for alerts
    pub channel_id: String,
    /// Balances strictly below this (decimal units) raise an alert
    pub low_balance_threshold: f64,
    /// Minimum interval between two alerts for one wallet
    pub alert_cooldown: Duration,
    /// Period of the health timer
    pub interval: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            network: "mainnet".to_string(),
            channel_id: String::new(),
            low_balance_threshold: 0.001,
            alert_cooldown: Duration::ZERO,
            interval: Duration::from_secs(60),
        }
    }
}

/// Operator wallet addresses per role, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct MonitoredWallets {
    pub liquidator: Vec<Address>,
    pub rollover: Vec<Address>,
    pub arbitrage: Vec<Address>,
}

impl MonitoredWallets {
    pub fn for_role(&self, role: WalletRole) -> &[Address] {
        match role {
            WalletRole::Liquidator => &self.liquidator,
            WalletRole::Rollover => &self.rollover,
            WalletRole::Arbitrage => &self.arbitrage,
        }
    }
}

/// A wallet under the low-balance threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct LowBalanceAlert {
    pub role: WalletRole,
    pub address: Address,
    pub balance: f64,
}

impl LowBalanceAlert {
    /// Throttle key, one per wallet and role.
    pub fn throttle_key(&self) -> String {
        format!("{}:{}", self.role, self.address.to_string().to_lowercase())
    }

    /// Alert text for the chat channel.
    pub fn message(&self, network: &str) -> String {
        format!(
            "No money left for {} {} on {} network",
            self.role.alert_label(),
            self.address,
            network
        )
    }
}

/// Gathers health signals and raises low-balance alerts.
pub struct HealthMonitor {
    private_node: Arc<dyn BlockHeightSource>,
    public_node: Arc<dyn BlockHeightSource>,
    balances: Arc<dyn BalanceSource>,
    alerter: Option<Arc<dyn ChatAlerter>>,
    throttle: Arc<NotificationThrottle>,
    wallets: MonitoredWallets,
    config: HealthMonitorConfig,
}

impl HealthMonitor {
    pub fn new(
        private_node: Arc<dyn BlockHeightSource>,
        public_node: Arc<dyn BlockHeightSource>,
        balances: Arc<dyn BalanceSource>,
        alerter: Option<Arc<dyn ChatAlerter>>,
        throttle: Arc<NotificationThrottle>,
        wallets: MonitoredWallets,
        config: HealthMonitorConfig,
    ) -> Self {
        Self {
            private_node,
            public_node,
            balances,
            alerter,
            throttle,
            wallets,
            config,
        }
    }

    pub fn config(&self) -> &HealthMonitorConfig {
        &self.config
    }

    /// Whether a chat alerter is wired in.
    pub fn alerts_enabled(&self) -> bool {
        self.alerter.is_some()
    }

    pub fn is_test_network(&self) -> bool {
        self.config.network == TEST_NETWORK
    }

    /// Gather a fresh snapshot.
    pub async fn gather(&self, open_positions: usize, open_liquidations: usize) -> HealthSignals {
        let (block_private, block_public, liquidator, rollover, arbitrage) = tokio::join!(
            self.block_height(self.private_node.as_ref()),
            self.block_height(self.public_node.as_ref()),
            self.role_balances(WalletRole::Liquidator),
            self.role_balances(WalletRole::Rollover),
            self.role_balances(WalletRole::Arbitrage),
        );

        HealthSignals {
            block_private,
            block_public,
            liquidator_balances: liquidator,
            rollover_balances: rollover,
            arbitrage_balances: arbitrage,
            open_positions,
            open_liquidations,
            taken_at: Utc::now(),
        }
    }

    async fn block_height(&self, source: &dyn BlockHeightSource) -> Signal<u64> {
        match source.block_number().await {
            Ok(block) => Signal::Available(block),
            Err(e) => {
                warn!(node = source.label(), error = %e, "Failed to get block number");
                Signal::unavailable(format!("{e:#}"))
            }
        }
    }

    /// Balances of every wallet of `role`. One failure fails the whole set.
    async fn role_balances(&self, role: WalletRole) -> Signal<WalletBalances> {
        let wallets = self.wallets.for_role(role);
        let mut balances = Vec::with_capacity(wallets.len());

        for &address in wallets {
            match self.balances.balance(address).await {
                Ok(wei) => balances.push((address, wei_to_decimal(wei))),
                Err(e) => {
                    warn!(role = %role, wallet = %address, error = %e, "Failed to retrieve wallet balance");
                    return Signal::unavailable(format!("{address}: {e:#}"));
                }
            }
        }

        Signal::Available(WalletBalances::new(balances))
    }

    /// Wallets below the threshold, liquidators first.
    ///
    /// Roles whose balances are unavailable produce no alerts.
    pub fn low_balance_alerts(&self, signals: &HealthSignals) -> Vec<LowBalanceAlert> {
        WalletRole::ALL
            .iter()
            .filter_map(|&role| signals.balances(role).value().map(|b| (role, b)))
            .flat_map(|(role, balances)| {
                balances
                    .below(self.config.low_balance_threshold)
                    .map(move |&(address, balance)| LowBalanceAlert {
                        role,
                        address,
                        balance,
                    })
            })
            .collect()
    }

    /// One timer tick: gather signals and alert on low balances.
    ///
    /// Returns the number of alerts delivered.
    pub async fn check_system(&self, open_positions: usize, open_liquidations: usize) -> usize {
        if self.is_test_network() {
            debug!("Test network, skipping health check");
            return 0;
        }
        let Some(alerter) = &self.alerter else {
            debug!("No chat alerter configured, skipping health check");
            return 0;
        };

        let signals = self.gather(open_positions, open_liquidations).await;
        debug!(
            block_private = ?signals.block_private.value(),
            block_public = ?signals.block_public.value(),
            positions = open_positions,
            liquidations = open_liquidations,
            "Health signals gathered"
        );

        let mut delivered = 0;
        for alert in self.low_balance_alerts(&signals) {
            if !self.throttle.try_notify(&alert.throttle_key(), self.config.alert_cooldown) {
                continue;
            }
            let text = alert.message(&self.config.network);
            info!(role = %alert.role, wallet = %alert.address, balance = alert.balance, "Low wallet balance");

            match alerter.send_message(&self.config.channel_id, &text).await {
                Ok(()) => delivered += 1,
                Err(e) => error!(wallet = %alert.address, error = %e, "Failed to send low-balance alert"),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixedHeight, RecordingChat, TableBalances};
    use alloy::primitives::U256;

    const MILLI: u64 = 1_000_000_000_000_000; // 0.001 in wei

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn wallets() -> MonitoredWallets {
        MonitoredWallets {
            liquidator: vec![addr(1), addr(2)],
            rollover: vec![addr(3)],
            arbitrage: vec![addr(4)],
        }
    }

    fn monitor(
        balances: TableBalances,
        chat: Option<Arc<RecordingChat>>,
        network: &str,
    ) -> HealthMonitor {
        HealthMonitor::new(
            Arc::new(FixedHeight { label: "private", height: Some(100) }),
            Arc::new(FixedHeight { label: "public", height: None }),
            Arc::new(balances),
            chat.map(|c| c as Arc<dyn ChatAlerter>),
            Arc::new(NotificationThrottle::new()),
            wallets(),
            HealthMonitorConfig {
                network: network.to_string(),
                channel_id: "-1001".to_string(),
                ..Default::default()
            },
        )
    }

    fn funded() -> TableBalances {
        TableBalances::default()
            .with(addr(1), U256::from(5 * MILLI))
            .with(addr(2), U256::from(5 * MILLI))
            .with(addr(3), U256::from(5 * MILLI))
            .with(addr(4), U256::from(5 * MILLI))
    }

    #[tokio::test]
    async fn test_failed_node_resolves_to_unavailable() {
        let health = monitor(funded(), None, "mainnet");
        let signals = health.gather(2, 1).await;

        assert_eq!(signals.block_private, Signal::Available(100));
        assert!(!signals.block_public.is_available());
        assert_eq!(signals.open_positions, 2);
        assert_eq!(signals.open_liquidations, 1);
        assert_eq!(
            signals.liquidator_balances.value().unwrap().get(&addr(2)),
            Some(0.005)
        );
    }

    #[tokio::test]
    async fn test_one_failing_wallet_fails_whole_set() {
        let balances = funded().failing(addr(2)).with(addr(1), U256::ZERO);
        let health = monitor(balances, None, "mainnet");
        let signals = health.gather(0, 0).await;

        assert!(!signals.liquidator_balances.is_available());
        assert!(signals.rollover_balances.is_available());

        // addr(1) is empty but its set failed, so no alert is derived from it
        let alerts = health.low_balance_alerts(&signals);
        assert!(alerts.iter().all(|a| a.role != WalletRole::Liquidator));
    }

    #[tokio::test]
    async fn test_low_balance_alerts_every_check() {
        let chat = Arc::new(RecordingChat::default());
        let balances = funded()
            .with(addr(2), U256::from(MILLI - 1))
            .with(addr(4), U256::ZERO);
        let health = monitor(balances, Some(chat.clone()), "mainnet");

        assert_eq!(health.check_system(0, 0).await, 2);
        assert_eq!(health.check_system(0, 0).await, 2);

        let messages = chat.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(
            messages[0],
            format!("No money left for liquidator {} on mainnet network", addr(2))
        );
        assert_eq!(
            messages[1],
            format!("No money left for arbitrage-wallet {} on mainnet network", addr(4))
        );
        assert!(chat.sent.lock().iter().all(|(channel, _)| channel == "-1001"));
    }

    #[tokio::test]
    async fn test_alerts_go_through_throttle() {
        let chat = Arc::new(RecordingChat::default());
        let throttle = Arc::new(NotificationThrottle::new());
        let health = HealthMonitor::new(
            Arc::new(FixedHeight { label: "private", height: Some(100) }),
            Arc::new(FixedHeight { label: "public", height: Some(100) }),
            Arc::new(funded().with(addr(3), U256::ZERO)),
            Some(chat.clone() as Arc<dyn ChatAlerter>),
            throttle.clone(),
            wallets(),
            HealthMonitorConfig {
                alert_cooldown: Duration::from_secs(3600),
                ..Default::default()
            },
        );

        assert_eq!(health.check_system(0, 0).await, 1);
        // inside the cooldown the same wallet is not alerted again
        assert_eq!(health.check_system(0, 0).await, 0);
        assert_eq!(chat.messages().len(), 1);

        let key = format!("rollover:{}", addr(3).to_string().to_lowercase());
        assert!(throttle.last_sent(&key).is_some());
    }

    #[tokio::test]
    async fn test_threshold_is_exclusive() {
        let chat = Arc::new(RecordingChat::default());
        let balances = funded().with(addr(3), U256::from(MILLI));
        let health = monitor(balances, Some(chat.clone()), "mainnet");

        assert_eq!(health.check_system(0, 0).await, 0);
    }

    #[tokio::test]
    async fn test_test_network_skips_check() {
        let chat = Arc::new(RecordingChat::default());
        let balances = funded().with(addr(1), U256::ZERO);
        let health = monitor(balances, Some(chat.clone()), TEST_NETWORK);

        assert!(health.is_test_network());
        assert_eq!(health.check_system(0, 0).await, 0);
        assert!(chat.messages().is_empty());
    }

    #[tokio::test]
    async fn test_no_alerter_skips_check() {
        let balances = funded();
        let health = monitor(balances, None, "mainnet");
        assert!(!health.alerts_enabled());
        assert_eq!(health.check_system(0, 0).await, 0);
    }
}
