use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    DEFAULT_LEASE_TTL, JobHandle, JobId, JobQueue, LeaseId, LeaseRenewal, LeasedJob,
    WorkerRegistry,
};
use crate::database::infrastructure::postgres::errors::{map_db_err, to_u64};
use crate::domain::ScanId;
use crate::error::{CoreError, Result};

/// Durable queue over the `scan_jobs` table.
#[derive(Clone)]
pub struct PostgresJobQueue {
    pool: PgPool,
    lease_ttl: Duration,
}

impl fmt::Debug for PostgresJobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresJobQueue")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .field("lease_ttl", &self.lease_ttl)
            .finish()
    }
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self::with_lease_ttl(pool, DEFAULT_LEASE_TTL)
    }

    pub fn with_lease_ttl(pool: PgPool, lease_ttl: Duration) -> Self {
        Self { pool, lease_ttl }
    }

    /// Return jobs whose lease ran out to the ready set. Returns how many
    /// were resurrected.
    pub async fn requeue_expired_leases(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE scan_jobs
            SET state = 'ready',
                lease_id = NULL,
                lease_owner = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE state = 'leased'
              AND lease_expires_at IS NOT NULL
              AND lease_expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("requeue expired leases", e))?;

        let requeued = result.rows_affected();
        if requeued > 0 {
            warn!(requeued, "requeued scan jobs with expired leases");
        }
        Ok(requeued)
    }

    async fn settle(&self, lease_id: LeaseId, state: &str, error: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE scan_jobs
            SET state = $2,
                last_error = $3,
                lease_id = NULL,
                lease_owner = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE lease_id = $1 AND state = 'leased'
            "#,
        )
        .bind(lease_id)
        .bind(state)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("settle scan job", e))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!(
                "lease {lease_id} is not held by any job"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn enqueue(&self, scan_id: ScanId) -> Result<JobHandle> {
        let id = JobId::new();
        sqlx::query(
            r#"
            INSERT INTO scan_jobs (id, scan_id, state, attempts, created_at, updated_at)
            VALUES ($1, $2, 'ready', 0, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(scan_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("enqueue scan job", e))?;

        debug!(job_id = %id, scan_id = %scan_id, "enqueued scan run");
        Ok(JobHandle { id, scan_id })
    }

    async fn dequeue(&self, worker_id: &str) -> Result<Option<LeasedJob>> {
        self.requeue_expired_leases().await?;

        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.lease_ttl)
                .map_err(|e| CoreError::Internal(format!("invalid lease ttl: {e}")))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_err("begin dequeue tx", e))?;

        let picked = sqlx::query(
            r#"
            SELECT id
            FROM scan_jobs
            WHERE state = 'ready'
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_db_err("dequeue select", e))?;

        let Some(picked) = picked else {
            drop(tx);
            return Ok(None);
        };
        let id: Uuid = picked
            .try_get("id")
            .map_err(|e| map_db_err("decode scan job", e))?;

        let lease_id = LeaseId::new();
        let row = sqlx::query(
            r#"
            UPDATE scan_jobs
            SET state = 'leased',
                attempts = attempts + 1,
                lease_id = $2,
                lease_owner = $3,
                lease_expires_at = $4,
                updated_at = NOW()
            WHERE id = $1 AND state = 'ready'
            RETURNING scan_id, attempts
            "#,
        )
        .bind(id)
        .bind(lease_id)
        .bind(worker_id)
        .bind(expires_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_db_err("dequeue update->leased", e))?;

        let Some(row) = row else {
            // Raced with another state change; treat as empty
            drop(tx);
            return Ok(None);
        };

        let scan_id: ScanId = row
            .try_get("scan_id")
            .map_err(|e| map_db_err("decode scan job", e))?;
        let attempts: i32 = row
            .try_get("attempts")
            .map_err(|e| map_db_err("decode scan job", e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_err("commit dequeue tx", e))?;

        Ok(Some(LeasedJob {
            id: JobId(id),
            lease_id,
            scan_id,
            attempts: u32::try_from(attempts).unwrap_or(0),
            lease_owner: worker_id.to_string(),
            lease_expires_at: expires_at,
        }))
    }

    async fn renew(&self, renewal: LeaseRenewal) -> Result<DateTime<Utc>> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(renewal.extend_by)
                .map_err(|e| CoreError::Internal(format!("invalid lease extension: {e}")))?;

        let renewed = sqlx::query(
            r#"
            UPDATE scan_jobs
            SET lease_expires_at = $2,
                updated_at = NOW()
            WHERE lease_id = $1 AND state = 'leased'
            "#,
        )
        .bind(renewal.lease_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("renew scan job lease", e))?;

        if renewed.rows_affected() == 0 {
            warn!(lease_id = %renewal.lease_id, "renewal failed: lease not held");
            return Err(CoreError::NotFound(format!(
                "lease {} not found or already settled",
                renewal.lease_id
            )));
        }
        Ok(expires_at)
    }

    async fn complete(&self, lease_id: LeaseId) -> Result<()> {
        self.settle(lease_id, "completed", None).await
    }

    async fn fail(&self, lease_id: LeaseId, error: &str) -> Result<()> {
        self.settle(lease_id, "failed", Some(error)).await
    }

    fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }

    async fn depth(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scan_jobs WHERE state = 'ready'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_err("queue depth", e))?;
        Ok(to_u64(count))
    }
}

/// Heartbeats persisted in the `workers` table so that a separate worker
/// process is visible to the HTTP process.
#[derive(Clone, Debug)]
pub struct PostgresWorkerRegistry {
    pool: PgPool,
}

impl PostgresWorkerRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkerRegistry for PostgresWorkerRegistry {
    async fn heartbeat(&self, worker_id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workers (id, started_at, last_heartbeat)
            VALUES ($1, $2, $2)
            ON CONFLICT (id) DO UPDATE SET last_heartbeat = EXCLUDED.last_heartbeat
            "#,
        )
        .bind(worker_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_db_err("record worker heartbeat", e))?;
        Ok(())
    }

    async fn latest_heartbeat(&self) -> Result<Option<DateTime<Utc>>> {
        sqlx::query_scalar("SELECT MAX(last_heartbeat) FROM workers")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_err("read worker heartbeat", e))
    }

    async fn deregister(&self, worker_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM workers WHERE id = $1")
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_err("deregister worker", e))?;
        info!(worker = worker_id, "worker deregistered");
        Ok(())
    }
}
