//! Public node block height over plain JSON-RPC.
//!
//! The public node is only used as an independent reference point for the
//! private node's chain tip, so a bare `eth_blockNumber` POST is enough.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::provider::BlockHeightSource;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    method: &'a str,
    jsonrpc: &'a str,
    params: [(); 0],
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// JSON-RPC client for the public node.
#[derive(Debug, Clone)]
pub struct PublicRpcClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl PublicRpcClient {
    /// Create a new client for the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub(crate) fn parse_hex_quantity(value: &str) -> Result<u64> {
    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    if digits.is_empty() {
        return Err(anyhow!("empty hex quantity"));
    }
    u64::from_str_radix(digits, 16).with_context(|| format!("invalid hex quantity '{value}'"))
}

#[async_trait]
impl BlockHeightSource for PublicRpcClient {
    fn label(&self) -> &str {
        "public"
    }

    async fn block_number(&self) -> Result<u64> {
        let request = JsonRpcRequest {
            method: "eth_blockNumber",
            jsonrpc: "2.0",
            params: [],
            id: 1,
        };

        let response: JsonRpcResponse = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .context("public node request failed")?
            .error_for_status()
            .context("public node returned an error status")?
            .json()
            .await
            .context("public node returned malformed JSON")?;

        if let Some(err) = response.error {
            return Err(anyhow!("public node JSON-RPC error: {err}"));
        }

        let result = response
            .result
            .ok_or_else(|| anyhow!("public node response has no result"))?;
        let block = parse_hex_quantity(&result)?;
        debug!(block = block, "Public node block number");
        Ok(block)
    }
}
