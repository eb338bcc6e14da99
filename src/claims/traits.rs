use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::models::{Claim, ClaimCounts, ClaimOutcome};
use crate::error::AppResult;
use crate::upstream::{Payout, PayoutRecord};

/// Durable claim table. The only synchronization point between concurrent
/// cycles: ownership is decided by the store's uniqueness on the upstream id.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Acquire a store handle for one cycle. Released when the session drops.
    async fn session(&self) -> AppResult<Box<dyn ClaimSession>>;

    async fn counts(&self) -> AppResult<ClaimCounts>;

    async fn ping(&self) -> AppResult<()>;
}

/// Store operations scoped to a single reconciliation cycle
#[async_trait]
pub trait ClaimSession: Send {
    /// Insert a processing claim unless one already exists for the payout.
    /// `None` means the payout is owned elsewhere.
    async fn insert_claim(&mut self, payout: &Payout) -> AppResult<Option<Claim>>;

    /// processing -> completed, only for this exact claim generation.
    /// `false` when the claim was already completed or superseded.
    async fn mark_completed(&mut self, claim: &Claim) -> AppResult<bool>;

    /// Drop processing claims started more than `timeout` ago so their payouts
    /// become claimable again. Completed claims are never touched.
    async fn reset_stuck(&mut self, timeout: Duration) -> AppResult<Vec<Uuid>>;

    /// Validate, then claim. Validation failures never reach the store.
    async fn try_claim(&mut self, record: &PayoutRecord) -> AppResult<ClaimOutcome> {
        let payout = match Payout::try_from(record) {
            Ok(payout) => payout,
            Err(e) => return Ok(ClaimOutcome::Rejected(e)),
        };

        Ok(match self.insert_claim(&payout).await? {
            Some(claim) => ClaimOutcome::Claimed(claim),
            None => ClaimOutcome::AlreadyClaimed,
        })
    }
}
