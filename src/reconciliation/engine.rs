use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::recovery::StuckClaimRecovery;
use crate::claims::{Claim, ClaimOutcome, ClaimSession, ClaimStore};
use crate::error::AppResult;
use crate::upstream::{PayoutRecord, PayoutSource, PayoutState};

/// Engine tuning
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Payouts claimed per store batch.
    pub batch_size: usize,
    /// State-transition calls in flight per batch.
    pub process_concurrency: usize,
    pub stuck_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            process_concurrency: 4,
            stuck_timeout: super::recovery::DEFAULT_STUCK_TIMEOUT,
        }
    }
}

/// What one cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub reset: usize,
    pub fetched: usize,
    pub claimed: usize,
    pub conflicts: usize,
    pub rejected: usize,
    pub processed: usize,
    pub transition_failed: usize,
    pub completion_failed: usize,
}

/// Receiver-side reconciliation: recover -> fetch -> claim -> process.
///
/// Cycles may run concurrently in this process and across replicas. Nothing here
/// locks; who owns a payout is decided by the claim store alone.
pub struct ReconciliationEngine {
    store: Arc<dyn ClaimStore>,
    source: Arc<dyn PayoutSource>,
    recovery: StuckClaimRecovery,
    config: EngineConfig,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn ClaimStore>,
        source: Arc<dyn PayoutSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            source,
            recovery: StuckClaimRecovery::new(config.stuck_timeout),
            config: EngineConfig {
                batch_size: config.batch_size.max(1),
                process_concurrency: config.process_concurrency.max(1),
                ..config
            },
        }
    }

    /// Run one full cycle. Errors only for store failures, which end the cycle;
    /// per-payout failures are counted in the report instead.
    pub async fn run_cycle(&self) -> AppResult<CycleReport> {
        let mut report = CycleReport::default();

        // Held for the whole cycle and returned to the pool on every exit path.
        let mut session = self.store.session().await?;

        report.reset = self.recovery.sweep(session.as_mut()).await?;

        let payouts = self.source.fetch_notifying().await;
        report.fetched = payouts.len();
        info!(fetched = report.fetched, "Fetched notifying payouts");

        if payouts.is_empty() {
            info!("No payouts to process");
            return Ok(report);
        }

        for batch in payouts.chunks(self.config.batch_size) {
            let claimed = self.claim_batch(session.as_mut(), batch, &mut report).await?;
            self.process_batch(session.as_mut(), claimed, &mut report).await;
        }

        info!(
            fetched = report.fetched,
            claimed = report.claimed,
            processed = report.processed,
            conflicts = report.conflicts,
            rejected = report.rejected,
            transition_failed = report.transition_failed,
            completion_failed = report.completion_failed,
            reset = report.reset,
            "✓ Reconciliation cycle complete"
        );

        Ok(report)
    }

    async fn claim_batch(
        &self,
        session: &mut dyn ClaimSession,
        batch: &[PayoutRecord],
        report: &mut CycleReport,
    ) -> AppResult<Vec<Claim>> {
        let mut claimed = Vec::with_capacity(batch.len());

        for record in batch {
            match session.try_claim(record).await? {
                ClaimOutcome::Claimed(claim) => {
                    debug!(payout_id = %claim.upstream_payout_id, claim_id = claim.id, "Claimed payout");
                    claimed.push(claim);
                }
                ClaimOutcome::AlreadyClaimed => {
                    debug!(payout_id = record.display_id(), "Payout owned elsewhere, skipping");
                    report.conflicts += 1;
                }
                ClaimOutcome::Rejected(reason) => {
                    warn!(payout_id = record.display_id(), %reason, "Dropping invalid payout");
                    report.rejected += 1;
                }
            }
        }

        report.claimed += claimed.len();
        info!(claimed = claimed.len(), batch = batch.len(), "Claimed batch");
        Ok(claimed)
    }

    async fn process_batch(
        &self,
        session: &mut dyn ClaimSession,
        claimed: Vec<Claim>,
        report: &mut CycleReport,
    ) {
        let source = &self.source;
        let transitioned: Vec<(Claim, bool)> = stream::iter(claimed)
            .map(|claim| async move {
                let ok = source
                    .request_state_transition(claim.upstream_payout_id, PayoutState::Processing)
                    .await;
                (claim, ok)
            })
            .buffer_unordered(self.config.process_concurrency)
            .collect()
            .await;

        for (claim, ok) in transitioned {
            let payout_id = claim.upstream_payout_id;

            if !ok {
                // Stays processing; recovery hands it back once the timeout passes.
                warn!(%payout_id, "Upstream transition failed, leaving claim for recovery");
                report.transition_failed += 1;
                continue;
            }

            match session.mark_completed(&claim).await {
                Ok(true) => {
                    info!(%payout_id, "Payout processed");
                    report.processed += 1;
                }
                Ok(false) => {
                    warn!(%payout_id, claim_id = claim.id, "Claim no longer ours to complete");
                    report.completion_failed += 1;
                }
                Err(e) => {
                    error!(%payout_id, error = %e, "Failed to mark payout completed");
                    report.completion_failed += 1;
                }
            }
        }
    }
}
