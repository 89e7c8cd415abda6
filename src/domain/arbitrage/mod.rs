//! Arbitrage domain - paths and the profitability decision

pub mod arbitrage_route;
pub mod profitability_guard;

pub use arbitrage_route::ArbitragePath;
pub use profitability_guard::ProfitabilityGuard;
