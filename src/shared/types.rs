//! Common types used across the application

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;

use crate::shared::errors::ArbitrageError;

/// Fungible token representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub address: Pubkey,
    pub symbol: String,
    pub decimals: u8,
}

impl Asset {
    pub fn new(address: Pubkey, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            decimals,
        }
    }
}

/// The fixed set of assets an engine recognizes, supplied at construction
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    by_address: HashMap<Pubkey, Asset>,
    order: Vec<Pubkey>,
}

impl AssetRegistry {
    pub fn new(assets: impl IntoIterator<Item = Asset>) -> Self {
        let mut registry = Self::default();
        for asset in assets {
            registry.insert(asset);
        }
        registry
    }

    pub fn insert(&mut self, asset: Asset) {
        if !self.by_address.contains_key(&asset.address) {
            self.order.push(asset.address);
        }
        self.by_address.insert(asset.address, asset);
    }

    pub fn get(&self, address: &Pubkey) -> Option<&Asset> {
        self.by_address.get(address)
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&Asset> {
        self.iter().find(|asset| asset.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Look up a recognized asset, rejecting unknown identifiers
    pub fn require(&self, address: &Pubkey) -> Result<&Asset, ArbitrageError> {
        self.get(address)
            .ok_or_else(|| ArbitrageError::InvalidRequest(format!("unrecognized asset {}", address)))
    }

    pub fn contains(&self, address: &Pubkey) -> bool {
        self.by_address.contains_key(address)
    }

    /// Assets in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.order.iter().filter_map(|address| self.by_address.get(address))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
