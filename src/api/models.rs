use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::claims::ClaimCounts;

// ========== RESPONSE MODELS ==========

/// Claim totals for cross-checking against the producer
#[derive(Debug, Serialize)]
pub struct CountsResponse {
    pub total: i64,
    /// Claims still in flight.
    pub processing: i64,
    pub completed: i64,
}

impl From<ClaimCounts> for CountsResponse {
    fn from(counts: ClaimCounts) -> Self {
        Self {
            total: counts.total,
            processing: counts.processing,
            completed: counts.completed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}
