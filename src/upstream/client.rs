use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::models::{PayoutRecord, PayoutState};
use super::retry::{RetryOutcome, RetryPolicy};
use super::traits::PayoutSource;
use crate::error::{AppError, AppResult, UpstreamError};

/// HTTP client for the payout producer
pub struct HttpPayoutSource {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpPayoutSource {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn list_url(&self) -> String {
        format!("{}/api/transaction/", self.base_url)
    }

    fn transition_url(&self, payout_id: Uuid) -> String {
        format!("{}/api/transaction/{}/", self.base_url, payout_id)
    }

    async fn try_fetch(&self, state: PayoutState) -> Result<Vec<PayoutRecord>, UpstreamError> {
        let response = self
            .client
            .post(self.list_url())
            .query(&[("state", state.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status: status.as_u16(), body });
        }

        let elements: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        let records = elements
            .into_iter()
            .filter_map(|element| match serde_json::from_value::<PayoutRecord>(element) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Dropping malformed payout element from listing");
                    None
                }
            })
            .collect();

        Ok(records)
    }

    async fn try_transition(
        &self,
        payout_id: Uuid,
        target: PayoutState,
    ) -> Result<(), UpstreamError> {
        let response = self
            .client
            .post(self.transition_url(payout_id))
            .form(&[("state", target.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status: status.as_u16(), body });
        }

        // The producer answers with the updated rows; an empty list means nothing changed.
        let updated: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        if updated.is_empty() {
            return Err(UpstreamError::NotApplied);
        }

        Ok(())
    }
}

#[async_trait]
impl PayoutSource for HttpPayoutSource {
    async fn fetch_notifying(&self) -> Vec<PayoutRecord> {
        match self.try_fetch(PayoutState::Notifying).await {
            Ok(records) => {
                debug!(count = records.len(), "Fetched notifying payouts");
                records
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch payouts from upstream, treating as empty");
                Vec::new()
            }
        }
    }

    async fn request_state_transition(&self, payout_id: Uuid, target: PayoutState) -> bool {
        let outcome = self
            .retry
            .run(|_| self.try_transition(payout_id, target))
            .instrument(info_span!("state_transition", %payout_id, %target))
            .await;

        match outcome {
            RetryOutcome::Success { attempts, .. } => {
                info!(%payout_id, %target, attempts, "✓ Upstream state updated");
                true
            }
            RetryOutcome::Exhausted { last_error, attempts } => {
                error!(%payout_id, %target, attempts, error = %last_error, "Upstream state update failed");
                false
            }
            RetryOutcome::Permanent { error, attempts } => {
                error!(%payout_id, %target, attempts, error = %error, "Upstream state update rejected");
                false
            }
        }
    }
}
