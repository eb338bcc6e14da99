use async_trait::async_trait;
use uuid::Uuid;

use super::models::{PayoutRecord, PayoutState};

/// The producer side of reconciliation.
///
/// Neither call surfaces errors: a failed fetch is "nothing available this round"
/// and a failed transition is `false` once the retry budget is spent.
#[async_trait]
pub trait PayoutSource: Send + Sync {
    /// Payouts currently in the notifying state. Empty on any transport failure.
    async fn fetch_notifying(&self) -> Vec<PayoutRecord>;

    /// True only if the producer confirmed the payout moved to `target`.
    /// Must be safe to repeat.
    async fn request_state_transition(&self, payout_id: Uuid, target: PayoutState) -> bool;
}
