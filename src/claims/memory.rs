use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{Claim, ClaimCounts, ClaimStatus};
use super::traits::{ClaimSession, ClaimStore};
use crate::error::{AppError, AppResult};
use crate::upstream::Payout;

/// In-memory claim table for tests. The write lock makes check-and-insert atomic,
/// standing in for the unique constraint.
#[derive(Default)]
pub struct MemoryClaimStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    rows: RwLock<HashMap<Uuid, Claim>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a store that refuses connections.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn get(&self, upstream_payout_id: Uuid) -> Option<Claim> {
        self.inner.rows.read().await.get(&upstream_payout_id).cloned()
    }

    /// Pretend the claim was taken `by` earlier than it was.
    pub async fn backdate(&self, upstream_payout_id: Uuid, by: chrono::Duration) {
        if let Some(claim) = self.inner.rows.write().await.get_mut(&upstream_payout_id) {
            claim.processing_started_at = claim.processing_started_at.map(|t| t - by);
        }
    }
}

#[async_trait]
impl ClaimStore for MemoryClaimStore {
    async fn session(&self) -> AppResult<Box<dyn ClaimSession>> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(Box::new(MemoryClaimSession {
            inner: self.inner.clone(),
        }))
    }

    async fn counts(&self) -> AppResult<ClaimCounts> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        let rows = self.inner.rows.read().await;
        let processing = rows
            .values()
            .filter(|c| c.processing_status == ClaimStatus::Processing)
            .count() as i64;
        let total = rows.len() as i64;
        Ok(ClaimCounts {
            total,
            processing,
            completed: total - processing,
        })
    }

    async fn ping(&self) -> AppResult<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

struct MemoryClaimSession {
    inner: Arc<Inner>,
}

#[async_trait]
impl ClaimSession for MemoryClaimSession {
    async fn insert_claim(&mut self, payout: &Payout) -> AppResult<Option<Claim>> {
        let mut rows = self.inner.rows.write().await;
        if rows.contains_key(&payout.id) {
            return Ok(None);
        }

        let claim = Claim {
            id: self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            upstream_payout_id: payout.id,
            create_time: payout.create_time,
            amount: payout.amount,
            recipient_account_identifier: payout.recipient_account_identifier.clone(),
            processing_status: ClaimStatus::Processing,
            processing_started_at: Some(Utc::now()),
            processing_completed_at: None,
        };
        rows.insert(payout.id, claim.clone());
        Ok(Some(claim))
    }

    async fn mark_completed(&mut self, claim: &Claim) -> AppResult<bool> {
        let mut rows = self.inner.rows.write().await;
        match rows.get_mut(&claim.upstream_payout_id) {
            Some(row) if row.id == claim.id && row.processing_status == ClaimStatus::Processing => {
                row.processing_status = ClaimStatus::Completed;
                row.processing_completed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reset_stuck(&mut self, timeout: Duration) -> AppResult<Vec<Uuid>> {
        let timeout = chrono::Duration::from_std(timeout)
            .map_err(|e| AppError::Internal(format!("Invalid stuck timeout: {}", e)))?;
        let cutoff = Utc::now() - timeout;

        let mut rows = self.inner.rows.write().await;
        let stuck: Vec<Uuid> = rows
            .values()
            .filter(|c| {
                c.processing_status == ClaimStatus::Processing
                    && c.processing_started_at.map_or(true, |t| t < cutoff)
            })
            .map(|c| c.upstream_payout_id)
            .collect();

        for id in &stuck {
            rows.remove(id);
        }
        Ok(stuck)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::claims::models::ClaimOutcome;
    use crate::upstream::fake::record;

    fn payout() -> Payout {
        Payout {
            id: Uuid::new_v4(),
            create_time: Utc::now(),
            amount: dec!(12.34),
            recipient_account_identifier: "4321".to_string(),
        }
    }

    #[tokio::test]
    async fn test_second_claim_loses() {
        let store = MemoryClaimStore::new();
        let mut session = store.session().await.unwrap();
        let p = record(Uuid::new_v4(), "12.34", "4321");

        assert!(matches!(
            session.try_claim(&p).await.unwrap(),
            ClaimOutcome::Claimed(_)
        ));
        assert_eq!(
            session.try_claim(&p).await.unwrap(),
            ClaimOutcome::AlreadyClaimed
        );
        assert_eq!(store.counts().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_concurrent_sessions_have_one_winner() {
        let store = Arc::new(MemoryClaimStore::new());
        let p = payout();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let p = p.clone();
            handles.push(tokio::spawn(async move {
                let mut session = store.session().await.unwrap();
                session.insert_claim(&p).await.unwrap().is_some()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_completed_claims_survive_recovery() {
        let store = MemoryClaimStore::new();
        let mut session = store.session().await.unwrap();
        let p = payout();
        let claim = session.insert_claim(&p).await.unwrap().unwrap();
        assert!(session.mark_completed(&claim).await.unwrap());

        store.backdate(p.id, chrono::Duration::hours(1)).await;
        let reset = session.reset_stuck(Duration::from_secs(300)).await.unwrap();

        assert!(reset.is_empty());
        assert_eq!(
            store.get(p.id).await.unwrap().processing_status,
            ClaimStatus::Completed
        );
        assert!(!session.mark_completed(&claim).await.unwrap());
    }

    #[tokio::test]
    async fn test_young_claims_are_left_alone() {
        let store = MemoryClaimStore::new();
        let mut session = store.session().await.unwrap();
        let p = payout();
        session.insert_claim(&p).await.unwrap();
        store.backdate(p.id, chrono::Duration::minutes(4)).await;

        let reset = session.reset_stuck(Duration::from_secs(300)).await.unwrap();

        assert!(reset.is_empty());
        assert!(session.insert_claim(&p).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_refuses_sessions() {
        let store = MemoryClaimStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.session().await,
            Err(AppError::Database(_))
        ));
    }
}
