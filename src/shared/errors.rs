//! Error handling for the application

use serde::Serialize;
use thiserror::Error;

/// Kind of failure reported back to the caller of an arbitrage operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnauthorizedCaller,
    ReentrantOperation,
    SlippageExceeded,
    InsufficientProfit,
    InsufficientLiquidity,
    TransferFailure,
    InvalidRequest,
}

/// Arbitrage-related errors.
///
/// Every variant raised inside an operation aborts that operation as a unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArbitrageError {
    #[error("Unauthorized caller: {0}")]
    UnauthorizedCaller(String),

    #[error("Operation already in flight")]
    ReentrantOperation,

    #[error("Slippage tolerance exceeded: got {actual}, minimum {minimum}")]
    SlippageExceeded { actual: u64, minimum: u64 },

    #[error("Insufficient profit: realized {realized}, owed {owed}")]
    InsufficientProfit { realized: u64, owed: u64 },

    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("Transfer failed: {0}")]
    TransferFailure(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ArbitrageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArbitrageError::UnauthorizedCaller(_) => ErrorKind::UnauthorizedCaller,
            ArbitrageError::ReentrantOperation => ErrorKind::ReentrantOperation,
            ArbitrageError::SlippageExceeded { .. } => ErrorKind::SlippageExceeded,
            ArbitrageError::InsufficientProfit { .. } => ErrorKind::InsufficientProfit,
            ArbitrageError::InsufficientLiquidity(_) => ErrorKind::InsufficientLiquidity,
            ArbitrageError::TransferFailure(_) => ErrorKind::TransferFailure,
            ArbitrageError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Arbitrage error: {0}")]
    Arbitrage(#[from] ArbitrageError),
}
