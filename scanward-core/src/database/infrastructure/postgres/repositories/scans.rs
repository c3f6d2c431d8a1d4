use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::debug;

use crate::database::infrastructure::postgres::errors::{map_db_err, to_i64, to_u64};
use crate::database::ports::{PageRequest, ScanRepository};
use crate::domain::{
    NewScan, Scan, ScanCompletion, ScanCounts, ScanDetailsUpdate, ScanId, ScanStatus,
    ScanSummary,
};
use crate::error::{CoreError, Result};

const SCAN_COLUMNS: &str = "id, provider_id, status, failed_reason, started_at, finished_at, \
     name, comment, created_at, updated_at";

/// PostgreSQL-backed implementation of the `ScanRepository` port.
#[derive(Clone, Debug)]
pub struct PostgresScanRepository {
    pool: PgPool,
}

impl PostgresScanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Stored status values a scan may hold to move into `next`.
    fn entry_states(next: ScanStatus) -> Vec<String> {
        ScanStatus::predecessors(next)
            .map(|status| status.as_str().to_string())
            .collect()
    }

    /// Explain a guarded status update that matched no row.
    async fn transition_refused(&self, id: ScanId, next: ScanStatus) -> CoreError {
        match self.get(id).await {
            Ok(Some(scan)) => scan
                .status
                .ensure_transition(next)
                .err()
                .unwrap_or_else(|| {
                    CoreError::Conflict(format!("scan {id} changed status concurrently"))
                }),
            Ok(None) => CoreError::not_found("scan", id),
            Err(err) => err,
        }
    }

    fn map_row(row: &PgRow) -> Result<Scan> {
        let decode = |e: sqlx::Error| map_db_err("decode scan", e);
        let status: String = row.try_get("status").map_err(decode)?;
        Ok(Scan {
            id: row.try_get("id").map_err(decode)?,
            provider_id: row.try_get("provider_id").map_err(decode)?,
            status: status.parse::<ScanStatus>()?,
            failed_reason: row.try_get("failed_reason").map_err(decode)?,
            started_at: row.try_get("started_at").map_err(decode)?,
            finished_at: row.try_get("finished_at").map_err(decode)?,
            name: row.try_get("name").map_err(decode)?,
            comment: row.try_get("comment").map_err(decode)?,
            created_at: row.try_get("created_at").map_err(decode)?,
            updated_at: row.try_get("updated_at").map_err(decode)?,
        })
    }
}

#[async_trait]
impl ScanRepository for PostgresScanRepository {
    async fn create(&self, scan: NewScan) -> Result<Scan> {
        let sql = format!(
            r#"
            INSERT INTO scans (id, provider_id, status, name, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {SCAN_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(ScanId::new())
            .bind(scan.provider_id)
            .bind(ScanStatus::Pending.as_str())
            .bind(&scan.name)
            .bind(&scan.comment)
            .bind(Utc::now())
            .fetch_one(self.pool())
            .await
            .map_err(|e| match map_db_err("create scan", e) {
                CoreError::NotFound(_) => CoreError::not_found("provider", scan.provider_id),
                other => other,
            })?;

        Self::map_row(&row)
    }

    async fn get(&self, id: ScanId) -> Result<Option<Scan>> {
        let sql = format!("SELECT {SCAN_COLUMNS} FROM scans WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_db_err("get scan", e))?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn list(&self, page: PageRequest) -> Result<Vec<Scan>> {
        let sql = format!(
            "SELECT {SCAN_COLUMNS} FROM scans ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(page.limit))
            .bind(to_i64(page.offset))
            .fetch_all(self.pool())
            .await
            .map_err(|e| map_db_err("list scans", e))?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scans")
            .fetch_one(self.pool())
            .await
            .map_err(|e| map_db_err("count scans", e))?;
        Ok(to_u64(count))
    }

    async fn update_details(&self, id: ScanId, update: ScanDetailsUpdate) -> Result<Scan> {
        let (comment_set, comment) = match update.comment {
            Some(value) => (true, value),
            None => (false, None),
        };
        let sql = format!(
            r#"
            UPDATE scans
            SET name = COALESCE($2, name),
                comment = CASE WHEN $3 THEN $4 ELSE comment END,
                updated_at = $5
            WHERE id = $1
            RETURNING {SCAN_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(update.name)
            .bind(comment_set)
            .bind(comment)
            .bind(Utc::now())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_db_err("update scan", e))?
            .ok_or_else(|| CoreError::not_found("scan", id))?;

        Self::map_row(&row)
    }

    async fn mark_started(&self, id: ScanId, started_at: DateTime<Utc>) -> Result<Scan> {
        let sql = format!(
            r#"
            UPDATE scans
            SET status = $2, started_at = $3, updated_at = $3
            WHERE id = $1 AND status = ANY($4)
            RETURNING {SCAN_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(ScanStatus::InProgress.as_str())
            .bind(started_at)
            .bind(Self::entry_states(ScanStatus::InProgress))
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_db_err("mark scan started", e))?;

        let Some(row) = row else {
            return Err(self.transition_refused(id, ScanStatus::InProgress).await);
        };
        debug!(scan_id = %id, "scan marked in_progress");
        Self::map_row(&row)
    }

    async fn mark_finished(&self, id: ScanId, completion: ScanCompletion) -> Result<Scan> {
        let sql = format!(
            r#"
            UPDATE scans
            SET status = $2, failed_reason = $3, finished_at = $4, updated_at = $4
            WHERE id = $1 AND status = ANY($5)
            RETURNING {SCAN_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(completion.status.as_str())
            .bind(&completion.failed_reason)
            .bind(completion.finished_at)
            .bind(Self::entry_states(completion.status))
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_db_err("mark scan finished", e))?;

        let Some(row) = row else {
            return Err(self.transition_refused(id, completion.status).await);
        };
        Self::map_row(&row)
    }

    async fn delete(&self, id: ScanId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM scans WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| map_db_err("delete scan", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn summary(&self, id: ScanId) -> Result<Option<ScanSummary>> {
        let row = sqlx::query(
            r#"
            SELECT s.status,
                   (SELECT COUNT(DISTINCT c.id) FROM checks c
                     WHERE c.provider_id = s.provider_id) AS checks_total,
                   COUNT(DISTINCT f.id) AS checks_executed,
                   COUNT(DISTINCT f.id) FILTER (WHERE f.success) AS checks_success,
                   COUNT(DISTINCT f.id) FILTER (WHERE NOT f.success) AS checks_failed
            FROM scans s
            LEFT JOIN findings f ON f.scan_id = s.id
            WHERE s.id = $1
            GROUP BY s.id
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_err("summarize scan", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let decode = |e: sqlx::Error| map_db_err("decode scan summary", e);
        let status: String = row.try_get("status").map_err(decode)?;
        let counts = ScanCounts {
            checks_total: row.try_get("checks_total").map_err(decode)?,
            checks_executed: row.try_get("checks_executed").map_err(decode)?,
            checks_success: row.try_get("checks_success").map_err(decode)?,
            checks_failed: row.try_get("checks_failed").map_err(decode)?,
        };

        Ok(Some(ScanSummary::from_counts(id, status.parse()?, counts)))
    }
}
