//! Loan positions and operator wallets as seen by the watcher.
//!
//! Positions are owned by the external position tracker; the watcher only
//! reads them. Wallets are loaded once from configuration.

use alloy::primitives::{Address, B256, U256};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Loan identifier.
pub type LoanId = B256;

/// Live loan collection shared with the position tracker.
pub type PositionMap = DashMap<LoanId, Position>;

/// Basis points denominator (10000 = 100%)
const BPS_DENOMINATOR: u64 = 10_000;

/// An open loan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub loan_id: LoanId,
    /// Current margin (18 decimals)
    pub current_margin: U256,
    /// Maintenance margin (18 decimals)
    pub maintenance_margin: U256,
    /// Principal in base units
    pub principal: U256,
    /// Borrowed asset
    pub loan_token: Address,
}

impl Position {
    pub fn new(
        loan_id: LoanId,
        current_margin: U256,
        maintenance_margin: U256,
        principal: U256,
        loan_token: Address,
    ) -> Self {
        Self {
            loan_id,
            current_margin,
            maintenance_margin,
            principal,
            loan_token,
        }
    }

    /// Check if the current margin is strictly below `ratio_bps` of the
    /// maintenance margin.
    ///
    /// Compared as `current * 10000 < maintenance * ratio_bps` so no
    /// precision is lost to integer division.
    pub fn is_margin_call(&self, ratio_bps: u32) -> bool {
        let lhs = self
            .current_margin
            .saturating_mul(U256::from(BPS_DENOMINATOR));
        let rhs = self
            .maintenance_margin
            .saturating_mul(U256::from(ratio_bps));
        lhs < rhs
    }
}

/// Operational role of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletRole {
    Liquidator,
    Rollover,
    Arbitrage,
}

impl WalletRole {
    pub const ALL: [WalletRole; 3] = [Self::Liquidator, Self::Rollover, Self::Arbitrage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Liquidator => "liquidator",
            Self::Rollover => "rollover",
            Self::Arbitrage => "arbitrage",
        }
    }

    /// Label used in low-balance alerts.
    pub fn alert_label(&self) -> &'static str {
        match self {
            Self::Liquidator => "liquidator",
            Self::Rollover => "rollover-wallet",
            Self::Arbitrage => "arbitrage-wallet",
        }
    }
}

impl fmt::Display for WalletRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operator wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Wallet {
    pub address: Address,
    pub role: WalletRole,
}

impl Wallet {
    pub fn new(address: Address, role: WalletRole) -> Self {
        Self { address, role }
    }
}
