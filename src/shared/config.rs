use anyhow::{bail, Context, Result};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr;
use std::{fs, path::Path};

use crate::shared::types::Asset;

fn default_slippage_bps() -> u32 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineCfg {
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    /// Borrow-asset balance the engine holds before the run, in UI units
    #[serde(default)]
    pub funding: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetCfg {
    pub symbol: String,
    /// Base58 address; a fresh one is generated when omitted
    pub address: Option<String>,
    pub decimals: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LendingPoolCfg {
    pub fee_bps: u32,
    /// Borrow-asset liquidity of the pool, in UI units
    pub liquidity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueCfg {
    pub name: String,
    pub fee_bps: u32,
    /// Reserves keyed by asset symbol, in UI units
    pub reserves: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeCfg {
    pub borrow: String,
    pub via: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    pub engine: EngineCfg,
    pub assets: Vec<AssetCfg>,
    pub lending_pool: LendingPoolCfg,
    pub venues: Vec<VenueCfg>,
    pub trade: TradeCfg,
}

impl SimulationConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path.as_ref())
            .with_context(|| format!("read {}", path.as_ref().display()))?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).context("parse simulation config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.venues.len() != 2 {
            bail!("exactly two venues are required, got {}", self.venues.len());
        }
        if self.engine.slippage_bps > 10_000 {
            bail!("slippage_bps must be at most 10000");
        }
        for symbol in [&self.trade.borrow, &self.trade.via] {
            if self.asset(symbol).is_none() {
                bail!("trade references unknown asset {}", symbol);
            }
        }
        if self.trade.borrow.eq_ignore_ascii_case(&self.trade.via) {
            bail!("borrow and via assets must differ");
        }
        for venue in &self.venues {
            for symbol in venue.reserves.keys() {
                if self.asset(symbol).is_none() {
                    bail!("venue {} holds unknown asset {}", venue.name, symbol);
                }
            }
        }
        Ok(())
    }

    pub fn asset(&self, symbol: &str) -> Option<&AssetCfg> {
        self.assets.iter().find(|a| a.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Resolve configured assets, generating addresses where none were given
    pub fn resolve_assets(&self) -> Result<Vec<Asset>> {
        self.assets
            .iter()
            .map(|cfg| {
                let address = match &cfg.address {
                    Some(address) => Pubkey::from_str(address)
                        .with_context(|| format!("invalid address for {}: {}", cfg.symbol, address))?,
                    None => Pubkey::new_unique(),
                };
                Ok(Asset::new(address, cfg.symbol.clone(), cfg.decimals))
            })
            .collect()
    }
}
