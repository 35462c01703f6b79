//! Private node access for block height and wallet balances.
//! Uses Alloy providers for type-safe RPC interactions.

use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Default deadline for a single node request.
pub const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(30);

/// Run a node request, failing it once `timeout` has passed.
pub(crate) async fn with_deadline<T, F>(timeout: Duration, what: &str, request: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, request)
        .await
        .map_err(|_| anyhow!("{what} timed out after {}ms", timeout.as_millis()))?
}

/// Anything that can report the current chain tip.
#[async_trait]
pub trait BlockHeightSource: Send + Sync {
    /// Short label used in logs ("private", "public").
    fn label(&self) -> &str;

    /// Current block number.
    async fn block_number(&self) -> Result<u64>;
}

/// Native-asset balance lookups.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Balance of `address` in wei.
    async fn balance(&self, address: Address) -> Result<U256>;
}

/// Client for the trusted (private) node.
#[derive(Debug, Clone)]
pub struct NodeClient {
    /// HTTP URL of the node
    http_url: String,
    timeout: Duration,
}

impl NodeClient {
    /// Create a client for the given node URL.
    pub fn new(http_url: impl Into<String>) -> Self {
        let http_url = http_url.into();
        info!(http = %http_url, "Private node client configured");
        Self {
            http_url,
            timeout: DEFAULT_NODE_TIMEOUT,
        }
    }

    /// Override the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the HTTP URL.
    pub fn http_url(&self) -> &str {
        &self.http_url
    }
}

#[async_trait]
impl BlockHeightSource for NodeClient {
    fn label(&self) -> &str {
        "private"
    }

    async fn block_number(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.http_url.parse()?);
        with_deadline(self.timeout, "private node eth_blockNumber", async {
            provider
                .get_block_number()
                .await
                .context("private node eth_blockNumber failed")
        })
        .await
    }
}

#[async_trait]
impl BalanceSource for NodeClient {
    #[instrument(skip(self))]
    async fn balance(&self, address: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.http_url.parse()?);
        let balance = with_deadline(self.timeout, "eth_getBalance", async {
            provider
                .get_balance(address)
                .await
                .with_context(|| format!("eth_getBalance failed for {address}"))
        })
        .await?;
        debug!(address = %address, balance = %balance, "Balance fetched");
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_and_url() {
        let node = NodeClient::new("http://localhost:4444");
        assert_eq!(node.label(), "private");
        assert_eq!(node.http_url(), "http://localhost:4444");
    }

    #[tokio::test]
    async fn test_invalid_url_is_an_error() {
        let node = NodeClient::new("not a url");
        assert!(node.block_number().await.is_err());
    }

    #[tokio::test]
    async fn test_silent_node_times_out() {
        // accepts connections, never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let node = NodeClient::new(url).with_timeout(Duration::from_millis(200));
        let result = tokio::time::timeout(Duration::from_secs(10), node.balance(Address::ZERO))
            .await
            .expect("balance query hung past its deadline");
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("timed out"));
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_live_block_number() {
        let node = NodeClient::new("https://public-node.rsk.co");
        assert!(node.block_number().await.unwrap() > 0);
    }
}
