//! Conversion from base units (wei, 18 decimals) to decimal amounts.
//!
//! Decimal values are for thresholds, display and notification payloads
//! only; comparisons on margins stay in integer space.

use alloy::primitives::U256;

/// 10^18: one whole native unit in wei.
pub const WEI_PER_UNIT: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Convert a wei amount to decimal units.
#[inline(always)]
pub fn wei_to_decimal(wei: U256) -> f64 {
    // For values that fit in u128, use direct conversion
    if wei <= U256::from(u128::MAX) {
        let value: u128 = wei.to();
        value as f64 / 1e18
    } else {
        let limbs = wei.as_limbs();
        let base = u64::MAX as f64 + 1.0;
        let value = limbs
            .iter()
            .rev()
            .fold(0.0f64, |acc, limb| acc * base + *limb as f64);
        value / 1e18
    }
}
