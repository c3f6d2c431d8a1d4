use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::database::infrastructure::postgres::errors::{map_db_err, to_i64, to_u64};
use crate::database::ports::{FindingRepository, PageRequest};
use crate::domain::{
    Finding, FindingId, NewFinding, ProviderId, ScanId, ensure_same_provider,
};
use crate::error::{CoreError, Result};

const FINDING_COLUMNS: &str = "id, scan_id, check_id, success, comment, created_at, updated_at";

/// PostgreSQL-backed implementation of the `FindingRepository` port.
#[derive(Clone, Debug)]
pub struct PostgresFindingRepository {
    pool: PgPool,
}

impl PostgresFindingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> std::result::Result<Finding, sqlx::Error> {
        Ok(Finding {
            id: row.try_get("id")?,
            scan_id: row.try_get("scan_id")?,
            check_id: row.try_get("check_id")?,
            success: row.try_get("success")?,
            comment: row.try_get("comment")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn map_rows(rows: &[PgRow]) -> Result<Vec<Finding>> {
        rows.iter()
            .map(Self::map_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| map_db_err("decode finding", e))
    }
}

#[async_trait]
impl FindingRepository for PostgresFindingRepository {
    async fn create(&self, finding: NewFinding) -> Result<Finding> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_db_err("begin finding tx", e))?;

        let scan_provider: ProviderId =
            sqlx::query_scalar("SELECT provider_id FROM scans WHERE id = $1")
                .bind(finding.scan_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_db_err("load scan provider", e))?
                .ok_or_else(|| CoreError::not_found("scan", finding.scan_id))?;

        let check_provider: ProviderId =
            sqlx::query_scalar("SELECT provider_id FROM checks WHERE id = $1")
                .bind(finding.check_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_db_err("load check provider", e))?
                .ok_or_else(|| CoreError::not_found("check", finding.check_id))?;

        ensure_same_provider(scan_provider, check_provider)?;

        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO findings (id, scan_id, check_id, success, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {FINDING_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(FindingId::new())
            .bind(finding.scan_id)
            .bind(finding.check_id)
            .bind(finding.success)
            .bind(&finding.comment)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_db_err("create finding", e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_err("commit finding tx", e))?;

        Self::map_row(&row).map_err(|e| map_db_err("decode finding", e))
    }

    async fn get(&self, scan_id: ScanId, id: FindingId) -> Result<Option<Finding>> {
        let sql = format!("SELECT {FINDING_COLUMNS} FROM findings WHERE id = $1 AND scan_id = $2");
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(scan_id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_db_err("get finding", e))?;

        row.as_ref()
            .map(Self::map_row)
            .transpose()
            .map_err(|e| map_db_err("decode finding", e))
    }

    async fn list_for_scan(&self, scan_id: ScanId, page: PageRequest) -> Result<Vec<Finding>> {
        let sql = format!(
            r#"
            SELECT {FINDING_COLUMNS}
            FROM findings
            WHERE scan_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(scan_id)
            .bind(i64::from(page.limit))
            .bind(to_i64(page.offset))
            .fetch_all(self.pool())
            .await
            .map_err(|e| map_db_err("list findings", e))?;

        Self::map_rows(&rows)
    }

    async fn count_for_scan(&self, scan_id: ScanId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM findings WHERE scan_id = $1")
            .bind(scan_id)
            .fetch_one(self.pool())
            .await
            .map_err(|e| map_db_err("count findings", e))?;
        Ok(to_u64(count))
    }

    async fn all_for_scan(&self, scan_id: ScanId) -> Result<Vec<Finding>> {
        let sql = format!(
            "SELECT {FINDING_COLUMNS} FROM findings WHERE scan_id = $1 ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(scan_id)
            .fetch_all(self.pool())
            .await
            .map_err(|e| map_db_err("load scan findings", e))?;

        Self::map_rows(&rows)
    }

    async fn update_comment(
        &self,
        scan_id: ScanId,
        id: FindingId,
        comment: Option<String>,
    ) -> Result<Finding> {
        let sql = format!(
            r#"
            UPDATE findings
            SET comment = $3, updated_at = $4
            WHERE id = $1 AND scan_id = $2
            RETURNING {FINDING_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(scan_id)
            .bind(comment)
            .bind(Utc::now())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_db_err("update finding", e))?
            .ok_or_else(|| CoreError::not_found("finding", id))?;

        Self::map_row(&row).map_err(|e| map_db_err("decode finding", e))
    }
}
