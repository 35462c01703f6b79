//! Watcher chain interaction layer.
//!
//! This crate provides:
//! - Block height and balance queries against the private node (Alloy)
//! - Block height queries against a public node over raw JSON-RPC
//! - Trade event lookup for open loans
//! - Reference prices from the protocol price feed
//! - Wei/decimal conversion helpers
//!
//! Every collaborator sits behind a trait so the monitoring core can be
//! driven by mocks in tests.

mod events;
mod price_feed;
mod provider;
mod rpc;
pub mod units;

pub use events::{TradeEvent, TradeEventReader, TradeEventSource};
pub use price_feed::{PriceFeed, PriceFeedContract};
pub use provider::{BalanceSource, BlockHeightSource, NodeClient};
pub use rpc::PublicRpcClient;
