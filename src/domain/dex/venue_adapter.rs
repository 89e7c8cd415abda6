use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{ExecutedLeg, SwapLeg, SwapVenue};
use crate::domain::ledger::AssetLedger;
use crate::math::constant_product_output;
use crate::shared::errors::ArbitrageError;
use solana_sdk::pubkey::Pubkey;

/// Executes single swaps against one venue on behalf of one account.
///
/// The venue is untrusted: its quote is recomputed from reported reserves
/// and its reported output is replaced by what the ledger actually shows.
#[derive(Clone)]
pub struct SwapVenueAdapter {
    venue: Arc<dyn SwapVenue>,
    ledger: AssetLedger,
}

impl SwapVenueAdapter {
    pub fn new(venue: Arc<dyn SwapVenue>, ledger: AssetLedger) -> Self {
        Self { venue, ledger }
    }

    pub fn venue_name(&self) -> &str {
        self.venue.name()
    }

    pub fn venue(&self) -> &Arc<dyn SwapVenue> {
        &self.venue
    }

    /// Expected output of swapping `input_amount` at current reserves
    pub async fn quote(
        &self,
        input_asset: &Pubkey,
        output_asset: &Pubkey,
        input_amount: u64,
    ) -> Result<u64, ArbitrageError> {
        let reserves = self.venue.get_reserves(input_asset, output_asset).await?;
        constant_product_output(
            input_amount,
            reserves.reserve_in,
            reserves.reserve_out,
            self.venue.fee_bps(),
        )
    }

    pub async fn swap(&self, leg: SwapLeg) -> Result<ExecutedLeg, ArbitrageError> {
        if leg.input_amount == 0 {
            return Err(ArbitrageError::InvalidRequest("swap input must be positive".to_string()));
        }

        let quoted_output = self
            .quote(&leg.input_asset, &leg.output_asset, leg.input_amount)
            .await?;
        if quoted_output < leg.minimum_output {
            return Err(ArbitrageError::SlippageExceeded {
                actual: quoted_output,
                minimum: leg.minimum_output,
            });
        }

        let holder = self.ledger.holder();
        let venue_address = self.venue.address();
        let token_ledger = self.ledger.ledger();
        let output_before = self.ledger.balance_of(&leg.output_asset).await;

        token_ledger
            .approve(&leg.input_asset, &holder, &venue_address, leg.input_amount)
            .await?;
        let reported = self
            .venue
            .swap(
                &holder,
                &leg.input_asset,
                &leg.output_asset,
                leg.input_amount,
                leg.minimum_output,
            )
            .await;
        // Never leave a standing allowance behind, whatever the venue did
        token_ledger
            .approve(&leg.input_asset, &holder, &venue_address, 0)
            .await?;
        let reported = reported?;

        let output_after = self.ledger.balance_of(&leg.output_asset).await;
        let output_amount = output_after.checked_sub(output_before).ok_or_else(|| {
            ArbitrageError::TransferFailure(format!(
                "{} balance fell during swap on {}",
                leg.output_asset,
                self.venue.name()
            ))
        })?;

        if reported != output_amount {
            warn!(
                venue = self.venue.name(),
                reported,
                measured = output_amount,
                "venue misreported swap output"
            );
        }
        if output_amount < leg.minimum_output {
            return Err(ArbitrageError::SlippageExceeded {
                actual: output_amount,
                minimum: leg.minimum_output,
            });
        }

        debug!(quoted_output, output_amount, "swap settled");
        info!(
            "🔄 {}: {} -> {} ({} in, {} out)",
            self.venue.name(),
            leg.input_asset,
            leg.output_asset,
            leg.input_amount,
            output_amount
        );

        Ok(ExecutedLeg {
            leg,
            quoted_output,
            output_amount,
        })
    }
}
