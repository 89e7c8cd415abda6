//! Ledger domain - token balances and the engine's view of them

mod asset_ledger;

pub use asset_ledger::{AssetLedger, BalanceSnapshot};

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use crate::shared::errors::ArbitrageError;

/// Marker for a position in the ledger journal.
///
/// Checkpoints nest; reverting or committing one also closes every
/// checkpoint opened after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    depth: usize,
    mark: usize,
}

impl Checkpoint {
    pub(crate) fn new(depth: usize, mark: usize) -> Self {
        Self { depth, mark }
    }

    /// Number of checkpoints open below this one
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Journal length when this checkpoint was taken
    pub fn mark(&self) -> usize {
        self.mark
    }
}

/// Token interface shared by the engine, the lending pool and the venues.
///
/// Balance and allowance mutations made while a checkpoint is open are
/// journaled so they can be undone as a unit.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn balance_of(&self, asset: &Pubkey, owner: &Pubkey) -> u64;

    async fn allowance(&self, asset: &Pubkey, owner: &Pubkey, spender: &Pubkey) -> u64;

    /// Move `amount` of `asset` from `from` to `to`
    async fn transfer(
        &self,
        asset: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<(), ArbitrageError>;

    /// Set the allowance `spender` may pull from `owner`
    async fn approve(
        &self,
        asset: &Pubkey,
        owner: &Pubkey,
        spender: &Pubkey,
        amount: u64,
    ) -> Result<(), ArbitrageError>;

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming allowance
    async fn transfer_from(
        &self,
        asset: &Pubkey,
        spender: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<(), ArbitrageError>;

    async fn checkpoint(&self) -> Checkpoint;

    /// Undo every mutation recorded since `checkpoint`, newest first
    async fn revert(&self, checkpoint: Checkpoint);

    /// Keep every mutation recorded since `checkpoint`
    async fn commit(&self, checkpoint: Checkpoint);
}
