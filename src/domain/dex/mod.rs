//! DEX domain - liquidity venues and the adapter the engine swaps through

mod venue_adapter;

pub use venue_adapter::SwapVenueAdapter;

use async_trait::async_trait;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use crate::shared::errors::ArbitrageError;
use crate::shared::utils::serialize_pubkey;

/// Reserves of a venue for one direction of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VenueReserves {
    pub reserve_in: u64,
    pub reserve_out: u64,
}

/// Outbound interface to an external, untrusted liquidity venue.
///
/// Implementations may call back into the engine from inside `swap`.
#[async_trait]
pub trait SwapVenue: Send + Sync {
    /// Human-readable venue name
    fn name(&self) -> &str;

    /// Account that receives input tokens and pays out output tokens
    fn address(&self) -> Pubkey;

    /// Swap fee in basis points
    fn fee_bps(&self) -> u32;

    async fn get_reserves(
        &self,
        input_asset: &Pubkey,
        output_asset: &Pubkey,
    ) -> Result<VenueReserves, ArbitrageError>;

    /// Pull `input_amount` from `trader` (requires an allowance) and pay the
    /// output to `trader`. Returns the amount the venue claims to have paid.
    async fn swap(
        &self,
        trader: &Pubkey,
        input_asset: &Pubkey,
        output_asset: &Pubkey,
        input_amount: u64,
        minimum_output: u64,
    ) -> Result<u64, ArbitrageError>;
}

/// One hop of an arbitrage path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapLeg {
    pub venue: String,
    #[serde(serialize_with = "serialize_pubkey")]
    pub input_asset: Pubkey,
    #[serde(serialize_with = "serialize_pubkey")]
    pub output_asset: Pubkey,
    pub input_amount: u64,
    pub minimum_output: u64,
}

/// A leg after execution, with the output measured from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutedLeg {
    pub leg: SwapLeg,
    pub quoted_output: u64,
    pub output_amount: u64,
}
