//! Utility functions and helpers

use serde::Serializer;
use solana_sdk::pubkey::Pubkey;

/// Format amount with proper decimals
pub fn format_amount(amount: u64, decimals: u8) -> String {
    format!("{:.6}", to_ui_amount(amount, decimals))
}

/// Convert base units into a human-readable amount
pub fn to_ui_amount(amount: u64, decimals: u8) -> f64 {
    amount as f64 / 10_f64.powi(decimals as i32)
}

/// Convert a human-readable amount into base units, rounding to the nearest unit.
///
/// Returns `None` for negative, non-finite or out-of-range values.
pub fn to_base_units(ui_amount: f64, decimals: u8) -> Option<u64> {
    if !ui_amount.is_finite() || ui_amount < 0.0 {
        return None;
    }
    let scaled = (ui_amount * 10_f64.powi(decimals as i32)).round();
    if scaled > u64::MAX as f64 {
        return None;
    }
    Some(scaled as u64)
}

/// Serialize an address as its base58 string
pub fn serialize_pubkey<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(key)
}

/// Generate unique ID
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
