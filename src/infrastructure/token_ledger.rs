//! In-memory token ledger with a reversible journal

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::ledger::{Checkpoint, TokenLedger};
use crate::shared::errors::ArbitrageError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum JournalEntry {
    Credit { asset: Pubkey, account: Pubkey, amount: u64 },
    Debit { asset: Pubkey, account: Pubkey, amount: u64 },
    Allowance { asset: Pubkey, owner: Pubkey, spender: Pubkey, previous: u64 },
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<(Pubkey, Pubkey), u64>,
    allowances: HashMap<(Pubkey, Pubkey, Pubkey), u64>,
    journal: Vec<JournalEntry>,
    checkpoints: Vec<usize>,
}

impl LedgerState {
    fn balance(&self, asset: &Pubkey, account: &Pubkey) -> u64 {
        self.balances.get(&(*asset, *account)).copied().unwrap_or(0)
    }

    fn record(&mut self, entry: JournalEntry) {
        if !self.checkpoints.is_empty() {
            self.journal.push(entry);
        }
    }

    fn debit(&mut self, asset: &Pubkey, account: &Pubkey, amount: u64) -> Result<(), ArbitrageError> {
        let current = self.balance(asset, account);
        let next = current.checked_sub(amount).ok_or_else(|| {
            ArbitrageError::TransferFailure(format!(
                "insufficient balance for {}: has {}, needs {}",
                account, current, amount
            ))
        })?;
        self.balances.insert((*asset, *account), next);
        self.record(JournalEntry::Debit { asset: *asset, account: *account, amount });
        Ok(())
    }

    fn credit(&mut self, asset: &Pubkey, account: &Pubkey, amount: u64) -> Result<(), ArbitrageError> {
        let current = self.balance(asset, account);
        let next = current
            .checked_add(amount)
            .ok_or_else(|| ArbitrageError::TransferFailure(format!("balance overflow for {}", account)))?;
        self.balances.insert((*asset, *account), next);
        self.record(JournalEntry::Credit { asset: *asset, account: *account, amount });
        Ok(())
    }

    fn move_funds(
        &mut self,
        asset: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<(), ArbitrageError> {
        // Both sides are checked before either is touched
        let available = self.balance(asset, from);
        if available < amount {
            return Err(ArbitrageError::TransferFailure(format!(
                "insufficient balance for {}: has {}, needs {}",
                from, available, amount
            )));
        }
        if from != to && self.balance(asset, to).checked_add(amount).is_none() {
            return Err(ArbitrageError::TransferFailure(format!("balance overflow for {}", to)));
        }
        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount)
    }

    fn set_allowance(&mut self, asset: &Pubkey, owner: &Pubkey, spender: &Pubkey, amount: u64) {
        let key = (*asset, *owner, *spender);
        let previous = self.allowances.get(&key).copied().unwrap_or(0);
        self.allowances.insert(key, amount);
        self.record(JournalEntry::Allowance {
            asset: *asset,
            owner: *owner,
            spender: *spender,
            previous,
        });
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Credit { asset, account, amount } => {
                let balance = self.balance(&asset, &account);
                self.balances.insert((asset, account), balance.saturating_sub(amount));
            }
            JournalEntry::Debit { asset, account, amount } => {
                let balance = self.balance(&asset, &account);
                self.balances.insert((asset, account), balance.saturating_add(amount));
            }
            JournalEntry::Allowance { asset, owner, spender, previous } => {
                self.allowances.insert((asset, owner, spender), previous);
            }
        }
    }
}

/// Shared balance book for every participant in a simulation
#[derive(Debug, Default)]
pub struct InMemoryTokenLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `amount` of `asset` out of thin air for `account`.
    ///
    /// Used to seed simulations; journaled like any other credit.
    pub async fn mint(&self, asset: &Pubkey, account: &Pubkey, amount: u64) -> Result<(), ArbitrageError> {
        self.state.write().await.credit(asset, account, amount)
    }

    /// Number of journal entries currently held
    pub async fn journal_len(&self) -> usize {
        self.state.read().await.journal.len()
    }

    /// Number of open checkpoints
    pub async fn open_checkpoints(&self) -> usize {
        self.state.read().await.checkpoints.len()
    }
}

#[async_trait]
impl TokenLedger for InMemoryTokenLedger {
    async fn balance_of(&self, asset: &Pubkey, owner: &Pubkey) -> u64 {
        self.state.read().await.balance(asset, owner)
    }

    async fn allowance(&self, asset: &Pubkey, owner: &Pubkey, spender: &Pubkey) -> u64 {
        self.state
            .read()
            .await
            .allowances
            .get(&(*asset, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    async fn transfer(
        &self,
        asset: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<(), ArbitrageError> {
        let mut state = self.state.write().await;
        state.move_funds(asset, from, to, amount)
    }

    async fn approve(
        &self,
        asset: &Pubkey,
        owner: &Pubkey,
        spender: &Pubkey,
        amount: u64,
    ) -> Result<(), ArbitrageError> {
        let mut state = self.state.write().await;
        state.set_allowance(asset, owner, spender, amount);
        Ok(())
    }

    async fn transfer_from(
        &self,
        asset: &Pubkey,
        spender: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<(), ArbitrageError> {
        let mut state = self.state.write().await;
        let allowed = state.allowances.get(&(*asset, *from, *spender)).copied().unwrap_or(0);
        if allowed < amount {
            return Err(ArbitrageError::TransferFailure(format!(
                "allowance of {} for {} is {}, needs {}",
                from, spender, allowed, amount
            )));
        }
        state.move_funds(asset, from, to, amount)?;
        state.set_allowance(asset, from, spender, allowed - amount);
        Ok(())
    }

    async fn checkpoint(&self) -> Checkpoint {
        let mut state = self.state.write().await;
        let mark = state.journal.len();
        state.checkpoints.push(mark);
        Checkpoint::new(state.checkpoints.len() - 1, mark)
    }

    async fn revert(&self, checkpoint: Checkpoint) {
        let mut state = self.state.write().await;
        while state.journal.len() > checkpoint.mark() {
            if let Some(entry) = state.journal.pop() {
                state.undo(entry);
            }
        }
        state.checkpoints.truncate(checkpoint.depth());
        debug!(depth = checkpoint.depth(), "ledger reverted to checkpoint");
    }

    async fn commit(&self, checkpoint: Checkpoint) {
        let mut state = self.state.write().await;
        state.checkpoints.truncate(checkpoint.depth());
        if state.checkpoints.is_empty() {
            state.journal.clear();
        }
    }
}
