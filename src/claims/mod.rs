// Durable payout claims
#[cfg(test)]
pub mod memory;
pub mod models;
pub mod repository;
pub mod traits;

pub use models::{Claim, ClaimCounts, ClaimOutcome};
pub use repository::PgClaimStore;
pub use traits::{ClaimSession, ClaimStore};
