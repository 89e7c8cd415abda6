//! Loan repayment and the record left behind by a settled operation

use chrono::{DateTime, Utc};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::domain::dex::ExecutedLeg;
use crate::domain::ledger::{AssetLedger, BalanceSnapshot};
use crate::shared::errors::ArbitrageError;

/// Pays the lending pool back out of the engine's balances
pub struct RepaymentSettler<'a> {
    ledger: &'a AssetLedger,
    pool: Pubkey,
}

impl<'a> RepaymentSettler<'a> {
    pub fn new(ledger: &'a AssetLedger, pool: Pubkey) -> Self {
        Self { ledger, pool }
    }

    /// Transfer exactly `amount_owed` of `asset` to the pool
    pub async fn settle(&self, asset: &Pubkey, amount_owed: u64) -> Result<u64, ArbitrageError> {
        let holder = self.ledger.holder();
        let token_ledger = self.ledger.ledger();
        let engine_before = self.ledger.balance_of(asset).await;
        let pool_before = token_ledger.balance_of(asset, &self.pool).await;

        token_ledger.transfer(asset, &holder, &self.pool, amount_owed).await?;

        let engine_after = self.ledger.balance_of(asset).await;
        let pool_after = token_ledger.balance_of(asset, &self.pool).await;
        let sent = engine_before.saturating_sub(engine_after);
        let received = pool_after.saturating_sub(pool_before);
        if sent != amount_owed || received != amount_owed {
            return Err(ArbitrageError::TransferFailure(format!(
                "repayment of {} moved {} out and {} in",
                amount_owed, sent, received
            )));
        }

        info!("💸 Repaid {} to lending pool {}", amount_owed, self.pool);
        Ok(amount_owed)
    }
}

/// Reserves of one venue after the operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VenueSnapshot {
    pub venue: String,
    pub borrow_asset_reserve: u64,
    pub intermediate_asset_reserve: u64,
}

/// Audit record of a settled arbitrage operation
#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    pub operation_id: String,
    pub request_id: u64,
    pub borrow_asset: String,
    pub principal: u64,
    pub fee: u64,
    pub amount_owed: u64,
    pub legs: Vec<ExecutedLeg>,
    pub profit: u64,
    pub engine_balances: BalanceSnapshot,
    pub venues: Vec<VenueSnapshot>,
    pub timestamp: DateTime<Utc>,
}

impl SettlementReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
