//! Flash-loan arbitrage settlement engine
//! Built with Domain-Driven Design principles

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod math;
pub mod shared;

// Re-export main types for convenience
pub use application::{FlashArbitrageEngine, OperationOutcome, Simulation};
pub use domain::ledger::TokenLedger;
pub use shared::errors::{AppError, ArbitrageError, ErrorKind};
