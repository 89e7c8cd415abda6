// src/math.rs
use crate::shared::errors::ArbitrageError;

pub const BPS_DENOMINATOR: u64 = 10_000;

/// Calculate output of a constant-product swap with the fee taken on the input.
///
/// `out = floor(in * (1 - fee) * reserve_out / (reserve_in + in * (1 - fee)))`,
/// evaluated in integer base units with the fee expressed in basis points.
pub fn constant_product_output(
    amount_in: u64,
    reserve_in: u64,
    reserve_out: u64,
    fee_bps: u32,
) -> Result<u64, ArbitrageError> {
    if amount_in == 0 {
        return Err(ArbitrageError::InvalidRequest("swap input must be positive".to_string()));
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(ArbitrageError::InsufficientLiquidity(format!(
            "empty reserves: in={}, out={}",
            reserve_in, reserve_out
        )));
    }
    if fee_bps as u64 >= BPS_DENOMINATOR {
        return Err(ArbitrageError::InvalidRequest(format!("fee of {} bps consumes the whole input", fee_bps)));
    }

    let overflow = || ArbitrageError::InsufficientLiquidity("swap size overflows pricing".to_string());

    let amount_in_with_fee = (amount_in as u128)
        .checked_mul((BPS_DENOMINATOR - fee_bps as u64) as u128)
        .ok_or_else(overflow)?;
    let numerator = amount_in_with_fee
        .checked_mul(reserve_out as u128)
        .ok_or_else(overflow)?;
    let denominator = (reserve_in as u128)
        .checked_mul(BPS_DENOMINATOR as u128)
        .and_then(|scaled| scaled.checked_add(amount_in_with_fee))
        .ok_or_else(overflow)?;

    // numerator / denominator < reserve_out, so the quotient fits in u64
    let amount_out = (numerator / denominator) as u64;
    if amount_out == 0 {
        return Err(ArbitrageError::InsufficientLiquidity(format!(
            "input {} too small against reserves {}/{}",
            amount_in, reserve_in, reserve_out
        )));
    }
    Ok(amount_out)
}

/// Calculate minimum output amount with slippage protection
pub fn calculate_min_out(amount_out: u64, slippage_bps: u32) -> u64 {
    let keep = BPS_DENOMINATOR.saturating_sub(slippage_bps as u64) as u128;
    ((amount_out as u128 * keep) / BPS_DENOMINATOR as u128) as u64
}

/// Calculate the fee a lender charges on `principal`, rounded up
pub fn calculate_loan_fee(principal: u64, fee_bps: u32) -> Result<u64, ArbitrageError> {
    let scaled = principal as u128 * fee_bps as u128;
    let fee = scaled.div_ceil(BPS_DENOMINATOR as u128);
    u64::try_from(fee).map_err(|_| ArbitrageError::InvalidRequest("loan fee overflows".to_string()))
}
