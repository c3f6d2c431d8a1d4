use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use crate::database::infrastructure::postgres::errors::{map_db_err, to_i64, to_u64};
use crate::database::ports::{PageRequest, ProviderRepository};
use crate::domain::{Provider, ProviderId, ProviderWithTotals};
use crate::error::{CoreError, Result};

/// PostgreSQL-backed implementation of the `ProviderRepository` port.
#[derive(Clone, Debug)]
pub struct PostgresProviderRepository {
    pool: PgPool,
}

impl PostgresProviderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> std::result::Result<Provider, sqlx::Error> {
        Ok(Provider {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn map_row_with_totals(row: &PgRow) -> std::result::Result<ProviderWithTotals, sqlx::Error> {
        Ok(ProviderWithTotals {
            provider: Self::map_row(row)?,
            checks_total: row.try_get("checks_total")?,
        })
    }
}

const SELECT_WITH_TOTALS: &str = r#"
    SELECT p.id, p.name, p.created_at, p.updated_at,
           COUNT(c.id) AS checks_total
    FROM providers p
    LEFT JOIN checks c ON c.provider_id = p.id
"#;

#[async_trait]
impl ProviderRepository for PostgresProviderRepository {
    async fn create(&self, name: &str) -> Result<Provider> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO providers (id, name, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(ProviderId::new())
        .bind(name)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_db_err("create provider", e))?;

        let provider = Self::map_row(&row).map_err(|e| map_db_err("decode provider", e))?;
        info!(provider_id = %provider.id, name = %provider.name, "created provider");
        Ok(provider)
    }

    async fn get(&self, id: ProviderId) -> Result<Option<ProviderWithTotals>> {
        let sql = format!("{SELECT_WITH_TOTALS} WHERE p.id = $1 GROUP BY p.id");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_db_err("get provider", e))?;

        row.as_ref()
            .map(Self::map_row_with_totals)
            .transpose()
            .map_err(|e| map_db_err("decode provider", e))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Provider>> {
        let row = sqlx::query(
            "SELECT id, name, created_at, updated_at FROM providers WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_err("find provider by name", e))?;

        row.as_ref()
            .map(Self::map_row)
            .transpose()
            .map_err(|e| map_db_err("decode provider", e))
    }

    async fn list(&self, page: PageRequest) -> Result<Vec<ProviderWithTotals>> {
        let sql = format!(
            "{SELECT_WITH_TOTALS} GROUP BY p.id ORDER BY p.name ASC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(page.limit))
            .bind(to_i64(page.offset))
            .fetch_all(self.pool())
            .await
            .map_err(|e| map_db_err("list providers", e))?;

        rows.iter()
            .map(Self::map_row_with_totals)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| map_db_err("decode provider", e))
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM providers")
            .fetch_one(self.pool())
            .await
            .map_err(|e| map_db_err("count providers", e))?;
        Ok(to_u64(count))
    }

    async fn rename(&self, id: ProviderId, name: &str) -> Result<Provider> {
        let row = sqlx::query(
            r#"
            UPDATE providers
            SET name = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(Utc::now())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_err("rename provider", e))?
        .ok_or_else(|| CoreError::not_found("provider", id))?;

        Self::map_row(&row).map_err(|e| map_db_err("decode provider", e))
    }

    async fn delete(&self, id: ProviderId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM providers WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| map_db_err("delete provider", e))?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(provider_id = %id, "deleted provider and its dependents");
        }
        Ok(removed)
    }
}
