// Payout producer integration
pub mod client;
#[cfg(test)]
pub mod fake;
pub mod models;
pub mod retry;
pub mod traits;

pub use client::HttpPayoutSource;
pub use models::{Payout, PayoutRecord, PayoutState};
pub use retry::RetryPolicy;
pub use traits::PayoutSource;
