use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CheckStore, StoreError};
use crate::db::models::{Check, CheckOutcome};

#[derive(Clone)]
pub struct PgCheckService {
    pool: PgPool,
}

impl PgCheckService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Recent checks, newest first. `limit` is clamped to 1..=1000.
    pub async fn list(
        &self,
        endpoint_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Check>, StoreError> {
        let limit = limit.clamp(1, 1000);
        let rows = match endpoint_id {
            Some(id) => {
                sqlx::query_as::<_, Check>(
                    "SELECT * FROM checks WHERE endpoint_id = $1 ORDER BY created_at DESC LIMIT $2",
                )
                .bind(id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Check>("SELECT * FROM checks ORDER BY created_at DESC LIMIT $1")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }
}

#[async_trait]
impl CheckStore for PgCheckService {
    async fn create(&self, endpoint_id: Uuid, outcome: &CheckOutcome) -> Result<Check, StoreError> {
        let check = sqlx::query_as::<_, Check>(
            r#"
            INSERT INTO checks
                (endpoint_id, status_code, success, response_time_ms, response_body, error)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(endpoint_id)
        .bind(outcome.status_code)
        .bind(outcome.success)
        .bind(outcome.response_time_ms)
        .bind(&outcome.response_body)
        .bind(&outcome.error)
        .fetch_one(&self.pool)
        .await?;
        Ok(check)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM checks WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
