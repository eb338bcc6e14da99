use std::sync::Arc;

use axum::extract::State;
use tracing::{error, info};

use super::handler::AppState;
use crate::error::AppResult;
use crate::reconciliation::{CycleReport, ReconciliationEngine};

/// Reconciliation trigger
/// GET /expenzy/webhook/ (also served as GET /webhook/)
///
/// The call carries no payload; it is only a hint to re-poll the producer.
/// Always answers `ok` so the caller never retries it.
pub async fn payout_webhook(State(state): State<AppState>) -> &'static str {
    info!("Webhook received");

    match run_detached(state.engine.clone()).await {
        Ok(report) => info!(
            fetched = report.fetched,
            claimed = report.claimed,
            processed = report.processed,
            "Webhook processing complete"
        ),
        Err(e) => error!(error = %e, "Error processing webhook"),
    }

    "ok"
}

/// Runs one cycle on its own task. A client hanging up drops the handler future,
/// but the cycle keeps going, and a panicking cycle surfaces as an error here.
pub async fn run_detached(engine: Arc<ReconciliationEngine>) -> AppResult<CycleReport> {
    tokio::spawn(async move { engine.run_cycle().await }).await?
}
