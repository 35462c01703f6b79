//! Reference prices from the protocol price feed contract.

use alloy::primitives::{Address, U256};
use alloy::providers::ProviderBuilder;
use alloy::sol;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::provider::{with_deadline, DEFAULT_NODE_TIMEOUT};
use crate::units::wei_to_decimal;

sol! {
    /// Price feed interface
    #[sol(rpc)]
    interface IPriceFeeds {
        function queryReturn(
            address sourceToken,
            address destToken,
            uint256 sourceAmount
        ) external view returns (uint256 destAmount);
    }
}

/// Quotes for a token pair.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Amount of `quote` received for `unit_amount` of `base`, as a decimal.
    async fn reference_price(&self, base: Address, quote: Address, unit_amount: U256)
        -> Result<f64>;
}

/// Price feed backed by the on-chain `queryReturn` view.
#[derive(Debug, Clone)]
pub struct PriceFeedContract {
    http_url: String,
    address: Address,
    timeout: Duration,
}

impl PriceFeedContract {
    pub fn new(http_url: impl Into<String>, address: Address) -> Self {
        Self {
            http_url: http_url.into(),
            address,
            timeout: DEFAULT_NODE_TIMEOUT,
        }
    }

    /// Override the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl PriceFeed for PriceFeedContract {
    #[instrument(skip(self))]
    async fn reference_price(
        &self,
        base: Address,
        quote: Address,
        unit_amount: U256,
    ) -> Result<f64> {
        let provider = ProviderBuilder::new().on_http(self.http_url.parse()?);
        let contract = IPriceFeeds::new(self.address, &provider);

        let result = with_deadline(self.timeout, "price feed queryReturn", async {
            contract
                .queryReturn(base, quote, unit_amount)
                .call()
                .await
                .context("price feed queryReturn failed")
        })
        .await?;

        let price = wei_to_decimal(result.destAmount);
        debug!(base = %base, quote = %quote, price = price, "Reference price");
        Ok(price)
    }
}
