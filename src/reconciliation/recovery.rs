use std::time::Duration;

use tracing::{info, warn};

use crate::claims::ClaimSession;
use crate::error::AppResult;

/// Default age after which a processing claim counts as abandoned.
pub const DEFAULT_STUCK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Sweep that hands abandoned claims back to the pool of claimable payouts
#[derive(Debug, Clone, Copy)]
pub struct StuckClaimRecovery {
    timeout: Duration,
}

impl StuckClaimRecovery {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns how many claims were reset.
    pub async fn sweep(&self, session: &mut dyn ClaimSession) -> AppResult<usize> {
        let reset = session.reset_stuck(self.timeout).await?;

        if !reset.is_empty() {
            warn!(
                count = reset.len(),
                timeout_secs = self.timeout.as_secs(),
                "♻️  Reset stuck payouts back to claimable"
            );
            for payout_id in &reset {
                info!(%payout_id, "Reset stuck payout");
            }
        }

        Ok(reset.len())
    }
}

impl Default for StuckClaimRecovery {
    fn default() -> Self {
        Self::new(DEFAULT_STUCK_TIMEOUT)
    }
}
