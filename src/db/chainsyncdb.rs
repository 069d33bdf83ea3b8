// db/chainsyncdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Error, Row};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::agreementmodel::AgreementStatus;
use crate::models::chainmodel::{ChainSyncJob, ChainSyncKind, ChainSyncStatus};

const JOB_COLUMNS: &str = r#"
    id, agreement_id, kind, target_status, status, attempts,
    last_error, last_tx_hash, next_attempt_at, created_at, updated_at
"#;

#[async_trait]
pub trait ChainSyncExt {
    /// Enqueues a ledger write in the caller's transaction, so the job and
    /// the state change it mirrors commit or roll back together.
    async fn enqueue_chain_job_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agreement_id: Uuid,
        kind: ChainSyncKind,
        target_status: Option<AgreementStatus>,
    ) -> Result<ChainSyncJob, Error>;

    /// Claims the next due job, skipping any agreement that still has an
    /// earlier unfinished job so per-agreement order holds. The claimed row
    /// is pushed `lease_secs` into the future; if the worker dies mid-call
    /// the job simply resurfaces after the lease.
    async fn claim_due_chain_job(&self, lease_secs: f64) -> Result<Option<ChainSyncJob>, Error>;

    async fn mark_chain_job_succeeded(
        &self,
        job_id: i64,
        tx_hash: Option<&str>,
    ) -> Result<(), Error>;

    async fn mark_chain_job_failed(&self, job_id: i64, error: &str) -> Result<(), Error>;

    /// Counts the attempt and schedules the next one.
    async fn reschedule_chain_job(
        &self,
        job_id: i64,
        next_attempt_at: DateTime<Utc>,
        error: &str,
        tx_hash: Option<&str>,
    ) -> Result<(), Error>;

    /// Pushes a job back without counting an attempt, for waits that are
    /// not failures (ledger module missing, registration still in flight).
    async fn defer_chain_job(
        &self,
        job_id: i64,
        next_attempt_at: DateTime<Utc>,
        note: &str,
    ) -> Result<(), Error>;

    async fn get_latest_chain_job(
        &self,
        agreement_id: Uuid,
        kind: ChainSyncKind,
    ) -> Result<Option<ChainSyncJob>, Error>;

    async fn count_chain_jobs(&self, status: ChainSyncStatus) -> Result<i64, Error>;
}

#[async_trait]
impl ChainSyncExt for DBClient {
    async fn enqueue_chain_job_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        agreement_id: Uuid,
        kind: ChainSyncKind,
        target_status: Option<AgreementStatus>,
    ) -> Result<ChainSyncJob, Error> {
        let query = format!(
            r#"
            INSERT INTO chain_sync_jobs (agreement_id, kind, target_status)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            JOB_COLUMNS
        );

        sqlx::query_as::<_, ChainSyncJob>(&query)
            .bind(agreement_id)
            .bind(kind)
            .bind(target_status)
            .fetch_one(&mut **tx)
            .await
    }

    async fn claim_due_chain_job(&self, lease_secs: f64) -> Result<Option<ChainSyncJob>, Error> {
        sqlx::query_as::<_, ChainSyncJob>(
            r#"
            WITH due AS (
                SELECT j.id
                FROM chain_sync_jobs j
                WHERE j.status = 'PENDING'
                  AND j.next_attempt_at <= NOW()
                  AND NOT EXISTS (
                      SELECT 1 FROM chain_sync_jobs e
                      WHERE e.agreement_id = j.agreement_id
                        AND e.status = 'PENDING'
                        AND e.id < j.id
                  )
                ORDER BY j.id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE chain_sync_jobs c
            SET next_attempt_at = NOW() + make_interval(secs => $1),
                updated_at = NOW()
            FROM due
            WHERE c.id = due.id
            RETURNING
                c.id, c.agreement_id, c.kind, c.target_status, c.status, c.attempts,
                c.last_error, c.last_tx_hash, c.next_attempt_at, c.created_at, c.updated_at
            "#,
        )
        .bind(lease_secs)
        .fetch_optional(&self.pool)
        .await
    }

    async fn mark_chain_job_succeeded(
        &self,
        job_id: i64,
        tx_hash: Option<&str>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE chain_sync_jobs
            SET status = 'SUCCEEDED',
                attempts = attempts + 1,
                last_error = NULL,
                last_tx_hash = COALESCE($2, last_tx_hash),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(tx_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_chain_job_failed(&self, job_id: i64, error: &str) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE chain_sync_jobs
            SET status = 'FAILED',
                attempts = attempts + 1,
                last_error = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reschedule_chain_job(
        &self,
        job_id: i64,
        next_attempt_at: DateTime<Utc>,
        error: &str,
        tx_hash: Option<&str>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE chain_sync_jobs
            SET attempts = attempts + 1,
                next_attempt_at = $2,
                last_error = $3,
                last_tx_hash = COALESCE($4, last_tx_hash),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(next_attempt_at)
        .bind(error)
        .bind(tx_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn defer_chain_job(
        &self,
        job_id: i64,
        next_attempt_at: DateTime<Utc>,
        note: &str,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE chain_sync_jobs
            SET next_attempt_at = $2,
                last_error = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(next_attempt_at)
        .bind(note)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_latest_chain_job(
        &self,
        agreement_id: Uuid,
        kind: ChainSyncKind,
    ) -> Result<Option<ChainSyncJob>, Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM chain_sync_jobs
            WHERE agreement_id = $1 AND kind = $2
            ORDER BY id DESC
            LIMIT 1
            "#,
            JOB_COLUMNS
        );
        sqlx::query_as::<_, ChainSyncJob>(&query)
            .bind(agreement_id)
            .bind(kind)
            .fetch_optional(&self.pool)
            .await
    }

    async fn count_chain_jobs(&self, status: ChainSyncStatus) -> Result<i64, Error> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM chain_sync_jobs WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("total"))
    }
}
