//! Infrastructure layer - in-memory ledger, lending pool and venues

mod constant_product_venue;
mod lending_pool;
mod token_ledger;

pub use constant_product_venue::ConstantProductVenue;
pub use lending_pool::SimulatedLendingPool;
pub use token_ledger::InMemoryTokenLedger;
