//! Constant-product liquidity venue backed by the in-memory ledger

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::debug;

use crate::domain::dex::{SwapVenue, VenueReserves};
use crate::domain::ledger::TokenLedger;
use crate::math::constant_product_output;
use crate::shared::errors::ArbitrageError;

/// x*y=k pool whose reserves are its own ledger balances
pub struct ConstantProductVenue {
    name: String,
    address: Pubkey,
    fee_bps: u32,
    ledger: Arc<dyn TokenLedger>,
}

impl ConstantProductVenue {
    pub fn new(name: impl Into<String>, fee_bps: u32, ledger: Arc<dyn TokenLedger>) -> Self {
        Self::with_address(name, Pubkey::new_unique(), fee_bps, ledger)
    }

    pub fn with_address(
        name: impl Into<String>,
        address: Pubkey,
        fee_bps: u32,
        ledger: Arc<dyn TokenLedger>,
    ) -> Self {
        Self {
            name: name.into(),
            address,
            fee_bps,
            ledger,
        }
    }
}

#[async_trait]
impl SwapVenue for ConstantProductVenue {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> Pubkey {
        self.address
    }

    fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    async fn get_reserves(
        &self,
        input_asset: &Pubkey,
        output_asset: &Pubkey,
    ) -> Result<VenueReserves, ArbitrageError> {
        Ok(VenueReserves {
            reserve_in: self.ledger.balance_of(input_asset, &self.address).await,
            reserve_out: self.ledger.balance_of(output_asset, &self.address).await,
        })
    }

    async fn swap(
        &self,
        trader: &Pubkey,
        input_asset: &Pubkey,
        output_asset: &Pubkey,
        input_amount: u64,
        minimum_output: u64,
    ) -> Result<u64, ArbitrageError> {
        let reserves = self.get_reserves(input_asset, output_asset).await?;
        let output_amount = constant_product_output(
            input_amount,
            reserves.reserve_in,
            reserves.reserve_out,
            self.fee_bps,
        )?;
        if output_amount < minimum_output {
            return Err(ArbitrageError::SlippageExceeded {
                actual: output_amount,
                minimum: minimum_output,
            });
        }

        self.ledger
            .transfer_from(input_asset, &self.address, trader, &self.address, input_amount)
            .await?;
        self.ledger
            .transfer(output_asset, &self.address, trader, output_amount)
            .await?;

        debug!(venue = %self.name, input_amount, output_amount, "venue swap");
        Ok(output_amount)
    }
}
