use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use tracing::error;

use super::models::*;
use crate::{claims::ClaimStore, error::AppResult, reconciliation::ReconciliationEngine};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ClaimStore>,
    pub engine: Arc<ReconciliationEngine>,
}

/// Total number of recorded payouts, as plain text
/// GET /payout/count
pub async fn payout_count(State(state): State<AppState>) -> AppResult<String> {
    let counts = state.store.counts().await?;
    Ok(counts.total.to_string())
}

/// Total and in-flight claim counts
/// GET /payout/counts
pub async fn payout_counts(State(state): State<AppState>) -> AppResult<Json<CountsResponse>> {
    let counts = state.store.counts().await?;
    Ok(Json(CountsResponse::from(counts)))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, label) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(e) => {
            error!(error = %e, "Health check failed to reach claim store");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            timestamp: Utc::now(),
        }),
    )
}
