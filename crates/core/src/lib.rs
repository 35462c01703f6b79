//! Watcher core logic.
//!
//! This crate provides the monitoring engine of the lending-protocol watcher:
//! - Per-role wallet queues with bounded in-flight operations
//! - Cooldown-based notification throttling
//! - Periodic system health checks with low-balance alerts
//! - Margin-call detection and borrower notification
//! - A facade wiring the monitors to the live position collections

pub mod config;
mod facade;
mod health;
mod margin;
mod position;
mod signals;
mod throttle;
mod wallet_queue;

#[cfg(test)]
mod test_support;

pub use config::{load_from_env, ResolvedConfig, WatcherConfig};
pub use facade::MonitorFacade;
pub use health::{HealthMonitor, HealthMonitorConfig, LowBalanceAlert, MonitoredWallets, TEST_NETWORK};
pub use margin::{
    liquidation_price, max_price_movement, BaseAsset, MarginCallConfig, MarginCallMonitor,
    MarginCallOutcome, ScanSummary,
};
pub use position::{LoanId, Position, PositionMap, Wallet, WalletRole};
pub use signals::{HealthSignals, Signal, WalletBalances};
pub use throttle::NotificationThrottle;
pub use wallet_queue::{QueueError, WalletQueueManager, MAX_CONCURRENT};
