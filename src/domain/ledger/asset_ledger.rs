use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::TokenLedger;
use crate::shared::types::AssetRegistry;

/// Read-only view of one account's balances
#[derive(Clone)]
pub struct AssetLedger {
    ledger: Arc<dyn TokenLedger>,
    holder: Pubkey,
}

/// Balances of a set of assets keyed by symbol
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub balances: BTreeMap<String, u64>,
}

impl BalanceSnapshot {
    pub fn get(&self, symbol: &str) -> u64 {
        self.balances.get(symbol).copied().unwrap_or(0)
    }
}

impl AssetLedger {
    pub fn new(ledger: Arc<dyn TokenLedger>, holder: Pubkey) -> Self {
        Self { ledger, holder }
    }

    pub fn holder(&self) -> Pubkey {
        self.holder
    }

    pub fn ledger(&self) -> &Arc<dyn TokenLedger> {
        &self.ledger
    }

    pub async fn balance_of(&self, asset: &Pubkey) -> u64 {
        self.ledger.balance_of(asset, &self.holder).await
    }

    pub async fn snapshot(&self, assets: &AssetRegistry) -> BalanceSnapshot {
        let mut balances = BTreeMap::new();
        for asset in assets.iter() {
            balances.insert(asset.symbol.clone(), self.balance_of(&asset.address).await);
        }
        BalanceSnapshot { balances }
    }
}
