use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{EndpointStore, StoreError};
use crate::db::models::Endpoint;

const ENDPOINT_COLUMNS: &str = "id, name, url, method, headers, payload, content_type, \
     test_file, test_file_name, form_field_name, timeout_ms, interval_seconds, \
     alert_on_failure, alert_threshold_ms, active, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct CreateEndpointRequest {
    pub name: String,
    pub url: String,
    pub method: Option<String>,
    pub headers: Option<serde_json::Value>,
    pub payload: Option<serde_json::Value>,
    pub content_type: Option<String>,
    /// Base64-encoded file content.
    pub test_file: Option<String>,
    pub test_file_name: Option<String>,
    pub form_field_name: Option<String>,
    pub timeout_ms: Option<i32>,
    pub interval_seconds: Option<i32>,
    pub alert_on_failure: Option<bool>,
    pub alert_threshold_ms: Option<i32>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateEndpointRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub headers: Option<serde_json::Value>,
    pub payload: Option<serde_json::Value>,
    pub content_type: Option<String>,
    pub test_file: Option<String>,
    pub test_file_name: Option<String>,
    pub form_field_name: Option<String>,
    pub timeout_ms: Option<i32>,
    pub interval_seconds: Option<i32>,
    pub alert_on_failure: Option<bool>,
    pub alert_threshold_ms: Option<i32>,
    pub active: Option<bool>,
}

#[derive(Clone)]
pub struct PgEndpointService {
    pool: PgPool,
}

impl PgEndpointService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<Endpoint>, StoreError> {
        let rows = sqlx::query_as::<_, Endpoint>(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM endpoints ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: Uuid) -> Result<Endpoint, StoreError> {
        sqlx::query_as::<_, Endpoint>(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))
    }

    pub async fn create(&self, req: CreateEndpointRequest) -> Result<Endpoint, StoreError> {
        validate_name_url(&req.name, &req.url)?;
        validate_timing(req.timeout_ms, req.interval_seconds)?;
        let test_file = decode_test_file(req.test_file.as_deref())?;

        let endpoint = sqlx::query_as::<_, Endpoint>(&format!(
            r#"
            INSERT INTO endpoints
                (name, url, method, headers, payload, content_type, test_file,
                 test_file_name, form_field_name, timeout_ms, interval_seconds,
                 alert_on_failure, alert_threshold_ms, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {ENDPOINT_COLUMNS}
            "#
        ))
        .bind(&req.name)
        .bind(&req.url)
        .bind(req.method.unwrap_or_else(|| "GET".to_string()))
        .bind(req.headers.unwrap_or_else(|| serde_json::json!({})))
        .bind(req.payload)
        .bind(req.content_type)
        .bind(test_file)
        .bind(req.test_file_name)
        .bind(req.form_field_name)
        .bind(req.timeout_ms)
        .bind(req.interval_seconds.unwrap_or(60))
        .bind(req.alert_on_failure.unwrap_or(true))
        .bind(req.alert_threshold_ms)
        .bind(req.active.unwrap_or(true))
        .fetch_one(&self.pool)
        .await?;

        Ok(endpoint)
    }

    /// Partial update: only the provided fields change. `updated_at` is
    /// always refreshed.
    pub async fn update(&self, id: Uuid, req: UpdateEndpointRequest) -> Result<Endpoint, StoreError> {
        validate_timing(req.timeout_ms, req.interval_seconds)?;
        let test_file = decode_test_file(req.test_file.as_deref())?;

        let endpoint = sqlx::query_as::<_, Endpoint>(&format!(
            r#"
            UPDATE endpoints SET
                name = COALESCE($2, name),
                url = COALESCE($3, url),
                method = COALESCE($4, method),
                headers = COALESCE($5, headers),
                payload = COALESCE($6, payload),
                content_type = COALESCE($7, content_type),
                test_file = COALESCE($8, test_file),
                test_file_name = COALESCE($9, test_file_name),
                form_field_name = COALESCE($10, form_field_name),
                timeout_ms = COALESCE($11, timeout_ms),
                interval_seconds = COALESCE($12, interval_seconds),
                alert_on_failure = COALESCE($13, alert_on_failure),
                alert_threshold_ms = COALESCE($14, alert_threshold_ms),
                active = COALESCE($15, active),
                updated_at = now()
            WHERE id = $1
            RETURNING {ENDPOINT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.name)
        .bind(req.url)
        .bind(req.method)
        .bind(req.headers)
        .bind(req.payload)
        .bind(req.content_type)
        .bind(test_file)
        .bind(req.test_file_name)
        .bind(req.form_field_name)
        .bind(req.timeout_ms)
        .bind(req.interval_seconds)
        .bind(req.alert_on_failure)
        .bind(req.alert_threshold_ms)
        .bind(req.active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        Ok(endpoint)
    }

    /// Soft delete: the row is kept for check/alert history but drops out of
    /// the scheduler's active snapshot.
    pub async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE endpoints SET active = FALSE, updated_at = now() WHERE id = $1")
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
impl EndpointStore for PgEndpointService {
    async fn list_active(&self) -> Result<Vec<Endpoint>, StoreError> {
        let rows = sqlx::query_as::<_, Endpoint>(&format!(
            "SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE active = TRUE ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn validate_name_url(name: &str, url: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidInput("name must not be empty".to_string()));
    }
    if url.trim().is_empty() {
        return Err(StoreError::InvalidInput("url must not be empty".to_string()));
    }
    Ok(())
}

fn validate_timing(timeout_ms: Option<i32>, interval_seconds: Option<i32>) -> Result<(), StoreError> {
    if let Some(timeout) = timeout_ms {
        if timeout <= 0 {
            return Err(StoreError::InvalidInput("timeout_ms must be positive".to_string()));
        }
    }
    if let Some(interval) = interval_seconds {
        if interval <= 0 {
            return Err(StoreError::InvalidInput(
                "interval_seconds must be positive".to_string(),
            ));
        }
    }
    Ok(())
}

fn decode_test_file(encoded: Option<&str>) -> Result<Option<Vec<u8>>, StoreError> {
    match encoded {
        Some(data) => base64::engine::general_purpose::STANDARD
            .decode(data)
            .map(Some)
            .map_err(|e| StoreError::InvalidInput(format!("test_file is not valid base64: {e}"))),
        None => Ok(None),
    }
}
