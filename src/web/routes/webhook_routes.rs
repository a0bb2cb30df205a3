use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use uuid::Uuid;

use crate::db::models::WebhookUrl;
use crate::db::services::webhook_service::CreateWebhookRequest;
use crate::web::{AppError, AppState};

pub fn webhook_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_webhooks).post(create_webhook))
        .route("/{id}/toggle", patch(toggle_webhook))
        .route("/{id}", axum::routing::delete(delete_webhook))
}

async fn list_webhooks(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<WebhookUrl>>, AppError> {
    Ok(Json(app_state.webhooks.list_all().await?))
}

async fn create_webhook(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateWebhookRequest>,
) -> Result<(StatusCode, Json<WebhookUrl>), AppError> {
    let webhook = app_state.webhooks.create(payload).await?;
    Ok((StatusCode::CREATED, Json(webhook)))
}

async fn toggle_webhook(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WebhookUrl>, AppError> {
    Ok(Json(app_state.webhooks.toggle(id).await?))
}

async fn delete_webhook(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.webhooks.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
