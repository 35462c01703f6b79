//! Hand-written collaborators for unit tests.

use alloy::primitives::{Address, B256, U256};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use watcher_api::{ChatAlerter, MarginCallMailer, MarginCallNotice, NotifyError};
use watcher_chain::{BalanceSource, BlockHeightSource, PriceFeed, TradeEvent, TradeEventSource};

/// Block height source returning a fixed value or failing.
pub struct FixedHeight {
    pub label: &'static str,
    pub height: Option<u64>,
}

#[async_trait]
impl BlockHeightSource for FixedHeight {
    fn label(&self) -> &str {
        self.label
    }

    async fn block_number(&self) -> Result<u64> {
        self.height.ok_or_else(|| anyhow!("{} node unreachable", self.label))
    }
}

/// Balances from a table; listed addresses fail.
#[derive(Default)]
pub struct TableBalances {
    pub balances: HashMap<Address, U256>,
    pub failing: HashSet<Address>,
    pub calls: AtomicUsize,
}

impl TableBalances {
    pub fn with(mut self, address: Address, wei: U256) -> Self {
        self.balances.insert(address, wei);
        self
    }

    pub fn failing(mut self, address: Address) -> Self {
        self.failing.insert(address);
        self
    }
}

#[async_trait]
impl BalanceSource for TableBalances {
    async fn balance(&self, address: Address) -> Result<U256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&address) {
            return Err(anyhow!("balance query failed for {address}"));
        }
        Ok(self.balances.get(&address).copied().unwrap_or(U256::ZERO))
    }
}

/// Chat alerter that records every message.
#[derive(Default)]
pub struct RecordingChat {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingChat {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, text)| text.clone()).collect()
    }
}

#[async_trait]
impl ChatAlerter for RecordingChat {
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), NotifyError> {
        self.sent.lock().push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Trade events from a table keyed by loan id.
#[derive(Default)]
pub struct TableEvents {
    pub events: HashMap<B256, TradeEvent>,
    pub failing: HashSet<B256>,
}

impl TableEvents {
    pub fn with(mut self, event: TradeEvent) -> Self {
        self.events.insert(event.loan_id, event);
        self
    }
}

#[async_trait]
impl TradeEventSource for TableEvents {
    async fn find_trade_event(
        &self,
        loan_id: B256,
        _from_block: u64,
        _to_block: Option<u64>,
    ) -> Result<Option<TradeEvent>> {
        if self.failing.contains(&loan_id) {
            return Err(anyhow!("getLogs failed"));
        }
        Ok(self.events.get(&loan_id).cloned())
    }
}

/// Price feed returning a constant.
pub struct FixedPrice(pub Option<f64>);

#[async_trait]
impl PriceFeed for FixedPrice {
    async fn reference_price(&self, _base: Address, _quote: Address, _unit: U256) -> Result<f64> {
        self.0.ok_or_else(|| anyhow!("price feed unavailable"))
    }
}

/// Mailer that records notices, optionally failing every send.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<MarginCallNotice>>,
    pub fail: bool,
}

#[async_trait]
impl MarginCallMailer for RecordingMailer {
    async fn send_margin_call(&self, notice: &MarginCallNotice) -> Result<(), NotifyError> {
        self.sent.lock().push(notice.clone());
        if self.fail {
            return Err(NotifyError::Status {
                service: "mail service",
                status: 500,
                body: "down".to_string(),
            });
        }
        Ok(())
    }
}

/// A trade event for `loan_id` opened by `user` at 2x leverage.
pub fn trade_event(loan_id: B256, user: Address) -> TradeEvent {
    TradeEvent {
        loan_id,
        user: Some(user),
        tx_hash: Some(B256::repeat_byte(0xEE)),
        block_number: Some(1_300_000),
        collateral_token: Address::repeat_byte(0xC0),
        loan_token: Address::repeat_byte(0xB7),
        position_size: U256::from(2_000u64),
        entry_leverage: U256::from(2_000_000_000_000_000_000u128),
    }
}
