//! Success/failure gate for a completed swap path

use crate::shared::errors::ArbitrageError;

pub struct ProfitabilityGuard;

impl ProfitabilityGuard {
    /// Returns the surplus kept by the engine when `realized` covers `owed`
    pub fn check(amount_owed: u64, realized: u64) -> Result<u64, ArbitrageError> {
        if realized >= amount_owed {
            Ok(realized - amount_owed)
        } else {
            Err(ArbitrageError::InsufficientProfit {
                realized,
                owed: amount_owed,
            })
        }
    }
}
