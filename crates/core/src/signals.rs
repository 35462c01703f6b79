//! Point-in-time health snapshot.
//!
//! Each provider-backed value is a [`Signal`]: either the value or the reason
//! it could not be read. When serialized for the status API an unavailable
//! signal is written as `-1`, which is what existing front-ends expect.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::position::WalletRole;

/// A value read from an external provider.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal<T> {
    Available(T),
    Unavailable { reason: String },
}

impl<T> Signal<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

impl<T> From<anyhow::Result<T>> for Signal<T> {
    fn from(result: anyhow::Result<T>) -> Self {
        match result {
            Ok(value) => Self::Available(value),
            Err(e) => Self::unavailable(format!("{e:#}")),
        }
    }
}

impl<T: Serialize> Serialize for Signal<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Available(value) => value.serialize(serializer),
            Self::Unavailable { .. } => serializer.serialize_i64(-1),
        }
    }
}

/// Balances of one wallet set, in configuration order, in decimal units.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WalletBalances(Vec<(Address, f64)>);

impl WalletBalances {
    pub fn new(balances: Vec<(Address, f64)>) -> Self {
        Self(balances)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Address, f64)> {
        self.0.iter()
    }

    pub fn get(&self, address: &Address) -> Option<f64> {
        self.0
            .iter()
            .find(|(a, _)| a == address)
            .map(|(_, balance)| *balance)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wallets strictly below `threshold`.
    pub fn below(&self, threshold: f64) -> impl Iterator<Item = &(Address, f64)> {
        self.0.iter().filter(move |(_, balance)| *balance < threshold)
    }
}

impl Serialize for WalletBalances {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (address, balance) in &self.0 {
            map.serialize_entry(&address.to_string(), balance)?;
        }
        map.end()
    }
}

/// Aggregate of every health signal at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSignals {
    /// Private node block height
    #[serde(rename = "blockInfoLn")]
    pub block_private: Signal<u64>,
    /// Public node block height
    #[serde(rename = "blockInfoPn")]
    pub block_public: Signal<u64>,
    #[serde(rename = "accountInfoLiq")]
    pub liquidator_balances: Signal<WalletBalances>,
    #[serde(rename = "accountInfoRoll")]
    pub rollover_balances: Signal<WalletBalances>,
    #[serde(rename = "accountInfoArb")]
    pub arbitrage_balances: Signal<WalletBalances>,
    #[serde(rename = "positionInfo")]
    pub open_positions: usize,
    #[serde(rename = "liqInfo")]
    pub open_liquidations: usize,
    #[serde(rename = "takenAt")]
    pub taken_at: DateTime<Utc>,
}

impl HealthSignals {
    /// Balances for a role.
    pub fn balances(&self, role: WalletRole) -> &Signal<WalletBalances> {
        match role {
            WalletRole::Liquidator => &self.liquidator_balances,
            WalletRole::Rollover => &self.rollover_balances,
            WalletRole::Arbitrage => &self.arbitrage_balances,
        }
    }

    /// How far the private node trails the public one, if both are known.
    pub fn block_lag(&self) -> Option<i64> {
        let private = *self.block_private.value()?;
        let public = *self.block_public.value()?;
        Some(public as i64 - private as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> HealthSignals {
        HealthSignals {
            block_private: Signal::Available(100),
            block_public: Signal::unavailable("timeout"),
            liquidator_balances: Signal::Available(WalletBalances::new(vec![
                (Address::repeat_byte(1), 0.5),
                (Address::repeat_byte(2), 0.0001),
            ])),
            rollover_balances: Signal::unavailable("rpc down"),
            arbitrage_balances: Signal::Available(WalletBalances::default()),
            open_positions: 3,
            open_liquidations: 1,
            taken_at: Utc::now(),
        }
    }

    #[test]
    fn test_unavailable_serializes_as_sentinel() {
        let json = serde_json::to_value(snapshot()).unwrap();
        assert_eq!(json["blockInfoLn"], 100);
        assert_eq!(json["blockInfoPn"], -1);
        assert_eq!(json["accountInfoRoll"], -1);
        assert_eq!(json["positionInfo"], 3);
        assert_eq!(json["liqInfo"], 1);
    }

    #[test]
    fn test_balances_serialize_as_map() {
        let json = serde_json::to_value(snapshot()).unwrap();
        let liq = json["accountInfoLiq"].as_object().unwrap();
        assert_eq!(liq.len(), 2);
        assert_eq!(liq[&Address::repeat_byte(1).to_string()], 0.5);
        assert!(json["accountInfoArb"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_below_threshold() {
        let signals = snapshot();
        let low: Vec<_> = signals
            .balances(WalletRole::Liquidator)
            .value()
            .unwrap()
            .below(0.001)
            .collect();
        assert_eq!(low, vec![&(Address::repeat_byte(2), 0.0001)]);
    }

    #[test]
    fn test_signal_from_result() {
        let ok: Signal<u64> = Ok(7).into();
        assert_eq!(ok, Signal::Available(7));

        let err: Signal<u64> = Err(anyhow::anyhow!("boom")).into();
        assert!(!err.is_available());
        assert_eq!(err.value(), None);
    }

    #[test]
    fn test_block_lag() {
        let mut signals = snapshot();
        assert_eq!(signals.block_lag(), None);
        signals.block_public = Signal::Available(105);
        assert_eq!(signals.block_lag(), Some(5));
    }
}
