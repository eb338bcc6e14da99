use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{PayoutRecord, PayoutState};
use super::traits::PayoutSource;

/// Scripted producer for engine and handler tests.
#[derive(Default)]
pub struct FakePayoutSource {
    listing: RwLock<Vec<PayoutRecord>>,
    failing: RwLock<HashSet<Uuid>>,
    transitions: RwLock<HashMap<Uuid, u32>>,
    transition_delay: RwLock<Option<Duration>>,
}

impl FakePayoutSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list(&self, records: Vec<PayoutRecord>) {
        *self.listing.write().await = records;
    }

    pub async fn fail_transitions_for(&self, payout_id: Uuid) {
        self.failing.write().await.insert(payout_id);
    }

    pub async fn heal(&self, payout_id: Uuid) {
        self.failing.write().await.remove(&payout_id);
    }

    pub async fn delay_transitions(&self, delay: Duration) {
        *self.transition_delay.write().await = Some(delay);
    }

    /// Successful transitions recorded per payout.
    pub async fn transitions(&self, payout_id: Uuid) -> u32 {
        self.transitions
            .read()
            .await
            .get(&payout_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PayoutSource for FakePayoutSource {
    async fn fetch_notifying(&self) -> Vec<PayoutRecord> {
        self.listing.read().await.clone()
    }

    async fn request_state_transition(&self, payout_id: Uuid, target: PayoutState) -> bool {
        if target != PayoutState::Processing {
            return false;
        }
        let delay = *self.transition_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.read().await.contains(&payout_id) {
            return false;
        }
        *self.transitions.write().await.entry(payout_id).or_insert(0) += 1;
        true
    }
}

pub fn record(id: Uuid, amount: &str, recipient: &str) -> PayoutRecord {
    PayoutRecord {
        id: Some(id.to_string()),
        create_time: Some("2025-10-18T10:15:00Z".to_string()),
        amount: Some(serde_json::Value::String(amount.to_string())),
        recipient_account_identifier: Some(recipient.to_string()),
        state: Some(PayoutState::Notifying.to_string()),
    }
}
