// Payout reconciliation: stuck-claim recovery and the cycle engine
pub mod engine;
pub mod recovery;

pub use engine::{CycleReport, EngineConfig, ReconciliationEngine};
