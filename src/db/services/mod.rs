pub mod alert_service;
pub mod check_service;
pub mod endpoint_service;
pub mod metrics_service;
pub mod webhook_service;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{Alert, Check, CheckOutcome, Endpoint, NewAlert, WebhookUrl};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(Uuid),
}

/// Read side of the endpoint table as the scheduler sees it: a snapshot of
/// active rows in creation order.
#[async_trait]
pub trait EndpointStore: Send + Sync {
    async fn list_active(&self) -> Result<Vec<Endpoint>, StoreError>;
}

#[async_trait]
pub trait CheckStore: Send + Sync {
    async fn create(&self, endpoint_id: Uuid, outcome: &CheckOutcome) -> Result<Check, StoreError>;
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn create(&self, alert: NewAlert) -> Result<Alert, StoreError>;
}

#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn list_active(&self) -> Result<Vec<WebhookUrl>, StoreError>;
}
