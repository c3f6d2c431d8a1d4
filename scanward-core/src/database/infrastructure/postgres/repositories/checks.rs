use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::database::infrastructure::postgres::errors::{map_db_err, to_i64, to_u64};
use crate::database::ports::{CheckRepository, PageRequest};
use crate::domain::{Check, CheckId, ProviderId};
use crate::error::{CoreError, Result};

/// PostgreSQL-backed implementation of the `CheckRepository` port.
#[derive(Clone, Debug)]
pub struct PostgresCheckRepository {
    pool: PgPool,
}

impl PostgresCheckRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> std::result::Result<Check, sqlx::Error> {
        Ok(Check {
            id: row.try_get("id")?,
            provider_id: row.try_get("provider_id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn map_rows(rows: &[PgRow]) -> Result<Vec<Check>> {
        rows.iter()
            .map(Self::map_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| map_db_err("decode check", e))
    }
}

#[async_trait]
impl CheckRepository for PostgresCheckRepository {
    async fn create(&self, provider_id: ProviderId, name: &str) -> Result<Check> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO checks (id, provider_id, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, provider_id, name, created_at, updated_at
            "#,
        )
        .bind(CheckId::new())
        .bind(provider_id)
        .bind(name)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| match map_db_err("create check", e) {
            CoreError::NotFound(_) => CoreError::not_found("provider", provider_id),
            other => other,
        })?;

        Self::map_row(&row).map_err(|e| map_db_err("decode check", e))
    }

    async fn get(&self, provider_id: ProviderId, id: CheckId) -> Result<Option<Check>> {
        let row = sqlx::query(
            r#"
            SELECT id, provider_id, name, created_at, updated_at
            FROM checks
            WHERE id = $1 AND provider_id = $2
            "#,
        )
        .bind(id)
        .bind(provider_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_err("get check", e))?;

        row.as_ref()
            .map(Self::map_row)
            .transpose()
            .map_err(|e| map_db_err("decode check", e))
    }

    async fn list_for_provider(
        &self,
        provider_id: ProviderId,
        page: PageRequest,
    ) -> Result<Vec<Check>> {
        let rows = sqlx::query(
            r#"
            SELECT id, provider_id, name, created_at, updated_at
            FROM checks
            WHERE provider_id = $1
            ORDER BY name ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(provider_id)
        .bind(i64::from(page.limit))
        .bind(to_i64(page.offset))
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_db_err("list checks", e))?;

        Self::map_rows(&rows)
    }

    async fn count_for_provider(&self, provider_id: ProviderId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checks WHERE provider_id = $1")
            .bind(provider_id)
            .fetch_one(self.pool())
            .await
            .map_err(|e| map_db_err("count checks", e))?;
        Ok(to_u64(count))
    }

    async fn all_for_provider(&self, provider_id: ProviderId) -> Result<Vec<Check>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.provider_id, c.name, c.created_at, c.updated_at
            FROM checks c
            JOIN providers p ON p.id = c.provider_id
            WHERE c.provider_id = $1
            ORDER BY p.name ASC, c.name ASC
            "#,
        )
        .bind(provider_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_db_err("enumerate provider checks", e))?;

        Self::map_rows(&rows)
    }

    async fn rename(&self, provider_id: ProviderId, id: CheckId, name: &str) -> Result<Check> {
        let row = sqlx::query(
            r#"
            UPDATE checks
            SET name = $3, updated_at = $4
            WHERE id = $1 AND provider_id = $2
            RETURNING id, provider_id, name, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(provider_id)
        .bind(name)
        .bind(Utc::now())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_err("rename check", e))?
        .ok_or_else(|| CoreError::not_found("check", id))?;

        Self::map_row(&row).map_err(|e| map_db_err("decode check", e))
    }

    async fn delete(&self, provider_id: ProviderId, id: CheckId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM checks WHERE id = $1 AND provider_id = $2")
            .bind(id)
            .bind(provider_id)
            .execute(self.pool())
            .await
            .map_err(|e| map_db_err("delete check", e))?;
        Ok(result.rows_affected() > 0)
    }
}
