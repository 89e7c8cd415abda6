//! Application layer - the arbitrage engine and the simulation that drives it

pub mod flash_arbitrage;
pub mod simulation;

pub use flash_arbitrage::{EngineConfig, FlashArbitrageEngine, OperationOutcome};
pub use simulation::{Simulation, SimulationReport};

#[cfg(test)]
mod tests;
