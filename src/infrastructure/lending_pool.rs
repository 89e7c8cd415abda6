//! Flash-loan pool backed by the in-memory ledger

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::lending::{CallbackContext, FlashLoanReceiver, LendingPool};
use crate::domain::ledger::TokenLedger;
use crate::math::calculate_loan_fee;
use crate::shared::errors::ArbitrageError;

/// Lends its own balances and charges `fee_bps` on the principal
pub struct SimulatedLendingPool {
    address: Pubkey,
    fee_bps: u32,
    ledger: Arc<dyn TokenLedger>,
}

impl SimulatedLendingPool {
    pub fn new(fee_bps: u32, ledger: Arc<dyn TokenLedger>) -> Self {
        Self::with_address(Pubkey::new_unique(), fee_bps, ledger)
    }

    pub fn with_address(address: Pubkey, fee_bps: u32, ledger: Arc<dyn TokenLedger>) -> Self {
        Self {
            address,
            fee_bps,
            ledger,
        }
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    /// Lend, call back and verify repayment; no rollback on failure
    async fn lend(
        &self,
        receiver: &dyn FlashLoanReceiver,
        asset: &Pubkey,
        amount: u64,
        data: &[u8],
    ) -> Result<(), ArbitrageError> {
        let available = self.ledger.balance_of(asset, &self.address).await;
        if available < amount {
            return Err(ArbitrageError::InsufficientLiquidity(format!(
                "pool holds {} of {}, {} requested",
                available, asset, amount
            )));
        }

        let fee = calculate_loan_fee(amount, self.fee_bps)?;
        let amount_owed = amount
            .checked_add(fee)
            .ok_or_else(|| ArbitrageError::InvalidRequest("amount owed overflows".to_string()))?;

        self.ledger
            .transfer(asset, &self.address, &receiver.receiver_address(), amount)
            .await?;

        receiver
            .on_loan_received(
                CallbackContext {
                    caller: self.address,
                    asset: *asset,
                    amount_received: amount,
                    amount_owed,
                },
                data,
            )
            .await?;

        let expected = available
            .checked_add(fee)
            .ok_or_else(|| ArbitrageError::TransferFailure("pool balance overflow".to_string()))?;
        let repaid = self.ledger.balance_of(asset, &self.address).await;
        if repaid < expected {
            return Err(ArbitrageError::TransferFailure(format!(
                "flash loan not repaid: pool holds {}, expected {}",
                repaid, expected
            )));
        }

        info!(amount, fee, "flash loan repaid");
        Ok(())
    }
}

#[async_trait]
impl LendingPool for SimulatedLendingPool {
    fn address(&self) -> Pubkey {
        self.address
    }

    async fn flash_loan(
        &self,
        receiver: &dyn FlashLoanReceiver,
        asset: &Pubkey,
        amount: u64,
        data: &[u8],
    ) -> Result<(), ArbitrageError> {
        // The pool undoes its own transfer if the borrower fails it
        let checkpoint = self.ledger.checkpoint().await;
        match self.lend(receiver, asset, amount, data).await {
            Ok(()) => {
                self.ledger.commit(checkpoint).await;
                Ok(())
            }
            Err(e) => {
                warn!("flash loan reverted: {}", e);
                self.ledger.revert(checkpoint).await;
                Err(e)
            }
        }
    }
}
