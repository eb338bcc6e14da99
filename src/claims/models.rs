use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, Type};
use uuid::Uuid;

use crate::error::PayoutValidationError;

/// Stored claim state. A payout with no row is pending; there is no stored
/// pending state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "claim_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Processing,
    Completed,
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimStatus::Processing => write!(f, "processing"),
            ClaimStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One row of the claim table.
///
/// `id` is regenerated every time the payout is claimed, so it doubles as the
/// claim generation: a completion carrying a stale `id` matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Claim {
    pub id: i64,
    pub upstream_payout_id: Uuid,
    pub create_time: DateTime<Utc>,
    pub amount: Decimal,
    pub recipient_account_identifier: String,
    pub processing_status: ClaimStatus,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
}

/// Result of an atomic claim attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This cycle now owns the payout.
    Claimed(Claim),
    /// Another cycle or replica owns it already.
    AlreadyClaimed,
    /// Malformed payload; dropped without touching the store.
    Rejected(PayoutValidationError),
}

/// Totals exposed for cross-checking against the producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, FromRow)]
pub struct ClaimCounts {
    pub total: i64,
    pub processing: i64,
    pub completed: i64,
}
