use std::time::Duration;

use async_trait::async_trait;
use sqlx::{pool::PoolConnection, PgPool, Postgres};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{Claim, ClaimCounts};
use super::traits::{ClaimSession, ClaimStore};
use crate::error::AppResult;
use crate::upstream::Payout;

/// Claim repository - THE source of truth for payout ownership
pub struct PgClaimStore {
    pool: PgPool,
}

impl PgClaimStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClaimStore for PgClaimStore {
    async fn session(&self) -> AppResult<Box<dyn ClaimSession>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgClaimSession { conn }))
    }

    async fn counts(&self) -> AppResult<ClaimCounts> {
        let counts = sqlx::query_as::<_, ClaimCounts>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE processing_status = 'processing') AS processing,
                COUNT(*) FILTER (WHERE processing_status = 'completed') AS completed
            FROM received_payout
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// One pooled connection held for the length of a cycle
pub struct PgClaimSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl ClaimSession for PgClaimSession {
    async fn insert_claim(&mut self, payout: &Payout) -> AppResult<Option<Claim>> {
        let claim = sqlx::query_as::<_, Claim>(
            r#"
            INSERT INTO received_payout (
                upstream_payout_id,
                create_time,
                amount,
                recipient_account_identifier,
                processing_status,
                processing_started_at
            )
            VALUES ($1, $2, $3, $4, 'processing', NOW())
            ON CONFLICT (upstream_payout_id) DO NOTHING
            RETURNING
                id, upstream_payout_id, create_time, amount, recipient_account_identifier,
                processing_status, processing_started_at, processing_completed_at
            "#,
        )
        .bind(payout.id)
        .bind(payout.create_time)
        .bind(payout.amount)
        .bind(&payout.recipient_account_identifier)
        .fetch_optional(&mut *self.conn)
        .await?;

        match &claim {
            Some(c) => debug!(payout_id = %payout.id, claim_id = c.id, "Claimed payout"),
            None => debug!(payout_id = %payout.id, "Payout already claimed, skipping"),
        }

        Ok(claim)
    }

    async fn mark_completed(&mut self, claim: &Claim) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE received_payout
            SET processing_status = 'completed',
                processing_completed_at = NOW()
            WHERE id = $1
              AND upstream_payout_id = $2
              AND processing_status = 'processing'
            "#,
        )
        .bind(claim.id)
        .bind(claim.upstream_payout_id)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn reset_stuck(&mut self, timeout: Duration) -> AppResult<Vec<Uuid>> {
        let reset = sqlx::query_scalar::<_, Uuid>(
            r#"
            DELETE FROM received_payout
            WHERE processing_status = 'processing'
              AND (processing_started_at IS NULL
                   OR processing_started_at < NOW() - make_interval(secs => $1))
            RETURNING upstream_payout_id
            "#,
        )
        .bind(timeout.as_secs_f64())
        .fetch_all(&mut *self.conn)
        .await?;

        if !reset.is_empty() {
            info!(count = reset.len(), "Deleted stuck processing claims");
        }

        Ok(reset)
    }
}
