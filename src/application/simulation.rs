//! Builds an in-memory world from configuration and runs one operation in it

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::info;

use crate::application::flash_arbitrage::{EngineConfig, FlashArbitrageEngine, OperationOutcome};
use crate::domain::arbitrage::ArbitragePath;
use crate::domain::dex::SwapVenue;
use crate::domain::execution::SettlementReport;
use crate::domain::ledger::BalanceSnapshot;
use crate::domain::lending::LendingPool;
use crate::infrastructure::{ConstantProductVenue, InMemoryTokenLedger, SimulatedLendingPool};
use crate::shared::config::SimulationConfig;
use crate::shared::types::{Asset, AssetRegistry};
use crate::shared::utils::to_base_units;

/// Result of a simulated run
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub outcome: OperationOutcome,
    pub error: Option<String>,
    pub balances_before: BalanceSnapshot,
    pub balances_after: BalanceSnapshot,
    pub settlement: Option<SettlementReport>,
}

impl SimulationReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub struct Simulation {
    pub ledger: Arc<InMemoryTokenLedger>,
    pub engine: FlashArbitrageEngine,
    pub owner: Pubkey,
    pub borrow_asset: Asset,
    pub principal: u64,
}

fn base_units(amount: f64, asset: &Asset, what: &str) -> Result<u64> {
    to_base_units(amount, asset.decimals)
        .ok_or_else(|| anyhow!("{} of {} {} is not representable", what, amount, asset.symbol))
}

impl Simulation {
    pub async fn from_config(cfg: &SimulationConfig) -> Result<Self> {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let assets = AssetRegistry::new(cfg.resolve_assets()?);
        let borrow_asset = assets
            .by_symbol(&cfg.trade.borrow)
            .cloned()
            .ok_or_else(|| anyhow!("unknown borrow asset {}", cfg.trade.borrow))?;
        let via_asset = assets
            .by_symbol(&cfg.trade.via)
            .cloned()
            .ok_or_else(|| anyhow!("unknown intermediate asset {}", cfg.trade.via))?;

        let pool = Arc::new(SimulatedLendingPool::new(cfg.lending_pool.fee_bps, ledger.clone()));
        let liquidity = base_units(cfg.lending_pool.liquidity, &borrow_asset, "pool liquidity")?;
        ledger.mint(&borrow_asset.address, &pool.address(), liquidity).await?;

        let mut venues: Vec<Arc<dyn SwapVenue>> = Vec::with_capacity(cfg.venues.len());
        for venue_cfg in &cfg.venues {
            let venue = Arc::new(ConstantProductVenue::new(
                venue_cfg.name.clone(),
                venue_cfg.fee_bps,
                ledger.clone(),
            ));
            for (symbol, amount) in &venue_cfg.reserves {
                let asset = assets
                    .by_symbol(symbol)
                    .ok_or_else(|| anyhow!("venue {} holds unknown asset {}", venue_cfg.name, symbol))?;
                let reserve = base_units(*amount, asset, "venue reserve")?;
                ledger.mint(&asset.address, &venue.address(), reserve).await?;
            }
            info!("🏦 Venue {} ready ({} bps)", venue_cfg.name, venue_cfg.fee_bps);
            venues.push(venue);
        }
        let venues: [Arc<dyn SwapVenue>; 2] = venues
            .try_into()
            .map_err(|_| anyhow!("exactly two venues are required"))?;

        let owner = Pubkey::new_unique();
        let engine = FlashArbitrageEngine::new(
            EngineConfig {
                address: Pubkey::new_unique(),
                owner,
                slippage_bps: cfg.engine.slippage_bps,
            },
            assets,
            vec![ArbitragePath::new(borrow_asset.address, via_asset.address)],
            pool,
            venues,
            ledger.clone(),
        )
        .context("build engine")?;

        let funding = base_units(cfg.engine.funding, &borrow_asset, "engine funding")?;
        ledger
            .mint(&borrow_asset.address, &engine.address(), funding)
            .await
            .context("fund engine")?;
        let principal = base_units(cfg.trade.amount, &borrow_asset, "trade amount")?;

        Ok(Self {
            ledger,
            engine,
            owner,
            borrow_asset,
            principal,
        })
    }

    pub async fn run(&self) -> SimulationReport {
        let balances_before = self.engine.balances().await;
        let result = self
            .engine
            .initiate_arbitrage(&self.owner, &self.borrow_asset.address, self.principal)
            .await;
        let balances_after = self.engine.balances().await;

        SimulationReport {
            outcome: OperationOutcome::from(&result),
            error: result.as_ref().err().map(|e| e.to_string()),
            settlement: result.ok(),
            balances_before,
            balances_after,
        }
    }
}
