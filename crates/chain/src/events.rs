//! Trade event lookup for open loans.
//!
//! The margin-call monitor needs the originating trade of a loan to find the
//! borrower, the leverage and the transaction hash. Logs are queried over
//! HTTP from a fixed historical block up to the chain tip.

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy::sol;
use alloy::sol_types::SolEvent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::provider::{with_deadline, DEFAULT_NODE_TIMEOUT};

sol! {
    /// Lending protocol interface (trade event only)
    interface ILoanProtocol {
        event Trade(
            address indexed user,
            address indexed lender,
            bytes32 indexed loanId,
            address collateralToken,
            address loanToken,
            uint256 positionSize,
            uint256 borrowedAmount,
            uint256 interestRate,
            uint256 settlementDate,
            uint256 entryPrice,
            uint256 entryLeverage,
            uint256 currentLeverage
        );
    }
}

/// Decoded trade that opened a loan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeEvent {
    /// Loan identifier
    pub loan_id: B256,
    /// Borrower; `None` when the log carries the zero address
    pub user: Option<Address>,
    /// Transaction that emitted the event
    pub tx_hash: Option<B256>,
    /// Block of the event
    pub block_number: Option<u64>,
    pub collateral_token: Address,
    pub loan_token: Address,
    /// Position size in base units
    pub position_size: U256,
    /// Leverage at entry (18 decimals)
    pub entry_leverage: U256,
}

/// Source of trade events keyed by loan id.
#[async_trait]
pub trait TradeEventSource: Send + Sync {
    /// Find the first trade event for `loan_id` in `[from_block, to_block]`.
    /// `to_block = None` searches up to the latest block.
    async fn find_trade_event(
        &self,
        loan_id: B256,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<Option<TradeEvent>>;
}

/// Reads trade events from the protocol contract via `eth_getLogs`.
#[derive(Debug, Clone)]
pub struct TradeEventReader {
    http_url: String,
    protocol: Address,
    timeout: Duration,
}

impl TradeEventReader {
    pub fn new(http_url: impl Into<String>, protocol: Address) -> Self {
        Self {
            http_url: http_url.into(),
            protocol,
            timeout: DEFAULT_NODE_TIMEOUT,
        }
    }

    /// Override the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the log filter for a single loan.
    fn filter(&self, loan_id: B256, from_block: u64, to_block: Option<u64>) -> Filter {
        let to = to_block
            .map(BlockNumberOrTag::Number)
            .unwrap_or(BlockNumberOrTag::Latest);

        Filter::new()
            .address(self.protocol)
            .event_signature(ILoanProtocol::Trade::SIGNATURE_HASH)
            .topic3(loan_id)
            .from_block(from_block)
            .to_block(to)
    }
}

#[async_trait]
impl TradeEventSource for TradeEventReader {
    #[instrument(skip(self), fields(loan_id = %loan_id))]
    async fn find_trade_event(
        &self,
        loan_id: B256,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<Option<TradeEvent>> {
        let provider = ProviderBuilder::new().on_http(self.http_url.parse()?);
        let filter = self.filter(loan_id, from_block, to_block);

        let logs = with_deadline(self.timeout, "eth_getLogs for Trade", async {
            provider
                .get_logs(&filter)
                .await
                .context("eth_getLogs for Trade failed")
        })
        .await?;

        debug!(count = logs.len(), "Trade logs fetched");

        Ok(logs.into_iter().find_map(parse_trade_log))
    }
}

/// Decode a raw log into a [`TradeEvent`], dropping anything malformed.
fn parse_trade_log(log: Log) -> Option<TradeEvent> {
    let tx_hash = log.transaction_hash;
    let block_number = log.block_number;

    let decoded = match log.log_decode::<ILoanProtocol::Trade>() {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "Failed to decode Trade log");
            return None;
        }
    };
    let trade = decoded.inner.data;

    Some(TradeEvent {
        loan_id: trade.loanId,
        user: (trade.user != Address::ZERO).then_some(trade.user),
        tx_hash,
        block_number,
        collateral_token: trade.collateralToken,
        loan_token: trade.loanToken,
        position_size: trade.positionSize,
        entry_leverage: trade.entryLeverage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::rpc::types::FilterBlockOption;

    fn trade(user: Address, loan_id: B256) -> ILoanProtocol::Trade {
        ILoanProtocol::Trade {
            user,
            lender: Address::repeat_byte(0x1E),
            loanId: loan_id,
            collateralToken: Address::repeat_byte(0xC0),
            loanToken: Address::repeat_byte(0xB7),
            positionSize: U256::from(2_000u64),
            borrowedAmount: U256::from(1_000u64),
            interestRate: U256::from(5u64),
            settlementDate: U256::from(1_700_000_000u64),
            entryPrice: U256::from(40_000u64),
            entryLeverage: U256::from(2_000_000_000_000_000_000u128),
            currentLeverage: U256::from(2_100_000_000_000_000_000u128),
        }
    }

    fn rpc_log(data: alloy::primitives::LogData) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(7),
                data,
            },
            transaction_hash: Some(B256::repeat_byte(0xEE)),
            block_number: Some(1_300_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_trade_log() {
        let loan_id = B256::repeat_byte(0xAB);
        let user = Address::repeat_byte(0xAA);
        let event = parse_trade_log(rpc_log(trade(user, loan_id).encode_log_data())).unwrap();

        assert_eq!(event.loan_id, loan_id);
        assert_eq!(event.user, Some(user));
        assert_eq!(event.tx_hash, Some(B256::repeat_byte(0xEE)));
        assert_eq!(event.block_number, Some(1_300_000));
        assert_eq!(event.loan_token, Address::repeat_byte(0xB7));
        assert_eq!(event.position_size, U256::from(2_000u64));
        assert_eq!(event.entry_leverage, U256::from(2_000_000_000_000_000_000u128));
    }

    #[test]
    fn test_zero_user_has_no_borrower() {
        let data = trade(Address::ZERO, B256::repeat_byte(1)).encode_log_data();
        let event = parse_trade_log(rpc_log(data)).unwrap();
        assert_eq!(event.user, None);
    }

    #[test]
    fn test_foreign_log_is_dropped() {
        let data = alloy::primitives::LogData::new_unchecked(vec![B256::repeat_byte(0x99)], Default::default());
        assert!(parse_trade_log(rpc_log(data)).is_none());
    }

    #[test]
    fn test_filter_targets_loan_topic() {
        let reader = TradeEventReader::new("http://localhost:4444", Address::repeat_byte(7));
        let loan_id = B256::repeat_byte(0xAB);
        let filter = reader.filter(loan_id, 1_205_639, None);

        assert!(filter.topics[0].matches(&ILoanProtocol::Trade::SIGNATURE_HASH));
        assert!(filter.topics[3].matches(&loan_id));
        assert!(!filter.topics[3].matches(&B256::ZERO));

        match filter.block_option {
            FilterBlockOption::Range {
                from_block,
                to_block,
            } => {
                assert_eq!(from_block, Some(BlockNumberOrTag::Number(1_205_639)));
                assert_eq!(to_block, Some(BlockNumberOrTag::Latest));
            }
            other => panic!("unexpected block option: {other:?}"),
        }
    }
}
