use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{AlertStore, StoreError};
use crate::db::models::{Alert, NewAlert};

#[derive(Clone)]
pub struct PgAlertService {
    pool: PgPool,
}

impl PgAlertService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Recent alerts, newest first. Dismissed alerts are hidden unless `all`
    /// is set. `limit` is clamped to 1..=500.
    pub async fn list(&self, limit: i64, all: bool) -> Result<Vec<Alert>, StoreError> {
        let limit = limit.clamp(1, 500);
        let rows = if all {
            sqlx::query_as::<_, Alert>("SELECT * FROM alerts ORDER BY created_at DESC LIMIT $1")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query_as::<_, Alert>(
                "SELECT * FROM alerts WHERE dismissed = FALSE ORDER BY created_at DESC LIMIT $1",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };
        Ok(rows)
    }

    pub async fn dismiss(&self, id: Uuid) -> Result<Alert, StoreError> {
        sqlx::query_as::<_, Alert>("UPDATE alerts SET dismissed = TRUE WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    pub async fn dismiss_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE alerts SET dismissed = TRUE WHERE dismissed = FALSE")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AlertStore for PgAlertService {
    async fn create(&self, alert: NewAlert) -> Result<Alert, StoreError> {
        let row = sqlx::query_as::<_, Alert>(
            r#"
            INSERT INTO alerts (endpoint_id, message, alert_type, sent)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(alert.endpoint_id)
        .bind(&alert.message)
        .bind(&alert.alert_type)
        .bind(alert.sent)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
