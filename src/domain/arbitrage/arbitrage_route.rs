//! Round-trip arbitrage paths across two venues

use solana_sdk::pubkey::Pubkey;

use crate::domain::dex::SwapLeg;

/// Borrowed asset A is swapped to B on the first venue and back to A on the second
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbitragePath {
    pub borrow_asset: Pubkey,
    pub intermediate_asset: Pubkey,
    /// Index of the venue for A -> B
    pub first_venue: usize,
    /// Index of the venue for B -> A
    pub second_venue: usize,
}

impl ArbitragePath {
    pub fn new(borrow_asset: Pubkey, intermediate_asset: Pubkey) -> Self {
        Self {
            borrow_asset,
            intermediate_asset,
            first_venue: 0,
            second_venue: 1,
        }
    }

    pub fn first_leg(&self, venue: &str, input_amount: u64, minimum_output: u64) -> SwapLeg {
        SwapLeg {
            venue: venue.to_string(),
            input_asset: self.borrow_asset,
            output_asset: self.intermediate_asset,
            input_amount,
            minimum_output,
        }
    }

    pub fn second_leg(&self, venue: &str, input_amount: u64, minimum_output: u64) -> SwapLeg {
        SwapLeg {
            venue: venue.to_string(),
            input_asset: self.intermediate_asset,
            output_asset: self.borrow_asset,
            input_amount,
            minimum_output,
        }
    }
}
