use async_trait::async_trait;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{StoreError, WebhookStore};
use crate::db::models::WebhookUrl;

#[derive(Debug, Deserialize)]
pub struct CreateWebhookRequest {
    pub url: String,
    pub label: Option<String>,
}

#[derive(Clone)]
pub struct PgWebhookService {
    pool: PgPool,
}

impl PgWebhookService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<WebhookUrl>, StoreError> {
        let rows =
            sqlx::query_as::<_, WebhookUrl>("SELECT * FROM webhook_urls ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    pub async fn create(&self, req: CreateWebhookRequest) -> Result<WebhookUrl, StoreError> {
        if req.url.trim().is_empty() {
            return Err(StoreError::InvalidInput("url must not be empty".to_string()));
        }
        let row = sqlx::query_as::<_, WebhookUrl>(
            "INSERT INTO webhook_urls (url, label) VALUES ($1, $2) RETURNING *",
        )
        .bind(&req.url)
        .bind(&req.label)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn toggle(&self, id: Uuid) -> Result<WebhookUrl, StoreError> {
        sqlx::query_as::<_, WebhookUrl>(
            "UPDATE webhook_urls SET active = NOT active WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM webhook_urls WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookStore for PgWebhookService {
    async fn list_active(&self) -> Result<Vec<WebhookUrl>, StoreError> {
        let rows = sqlx::query_as::<_, WebhookUrl>(
            "SELECT * FROM webhook_urls WHERE active = TRUE ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
