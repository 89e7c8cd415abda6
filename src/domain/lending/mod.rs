//! Lending domain - flash loans and the callback contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::shared::errors::ArbitrageError;

/// A borrow issued by the engine, live for exactly one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub request_id: u64,
    pub asset: Pubkey,
    pub principal: u64,
    pub initiator: Pubkey,
}

impl LoanRequest {
    /// Opaque context data handed to the pool and echoed back in the callback
    pub fn encode(&self) -> Result<Vec<u8>, ArbitrageError> {
        bincode::serialize(self)
            .map_err(|e| ArbitrageError::InvalidRequest(format!("failed to encode loan context: {}", e)))
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        bincode::deserialize(data).ok()
    }
}

/// What the pool reports when it hands over the borrowed funds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackContext {
    pub caller: Pubkey,
    pub asset: Pubkey,
    pub amount_received: u64,
    pub amount_owed: u64,
}

impl CallbackContext {
    pub fn fee(&self) -> u64 {
        self.amount_owed.saturating_sub(self.amount_received)
    }
}

/// Inbound contract a flash-loan borrower implements.
///
/// Returning an error tells the pool the loan was not honored.
#[async_trait]
pub trait FlashLoanReceiver: Send + Sync {
    /// Account the pool pays the principal into
    fn receiver_address(&self) -> Pubkey;

    async fn on_loan_received(
        &self,
        context: CallbackContext,
        data: &[u8],
    ) -> Result<(), ArbitrageError>;
}

/// Outbound interface to the lending pool
#[async_trait]
pub trait LendingPool: Send + Sync {
    /// Identity the pool presents when calling back
    fn address(&self) -> Pubkey;

    /// Lend `amount` of `asset` to `receiver`, invoke its callback and make
    /// sure principal plus fee came back before returning.
    async fn flash_loan(
        &self,
        receiver: &dyn FlashLoanReceiver,
        asset: &Pubkey,
        amount: u64,
        data: &[u8],
    ) -> Result<(), ArbitrageError>;
}
