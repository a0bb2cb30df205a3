use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::models::Alert;
use crate::web::{AppError, AppState};

#[derive(Deserialize)]
pub struct AlertQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Include dismissed alerts.
    #[serde(default)]
    pub all: bool,
}

fn default_limit() -> i64 {
    50
}

pub fn alert_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_alerts))
        .route("/dismiss", post(dismiss_all_alerts))
        .route("/{id}/dismiss", post(dismiss_alert))
}

async fn list_alerts(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<AlertQuery>,
) -> Result<Json<Vec<Alert>>, AppError> {
    Ok(Json(app_state.alerts.list(query.limit, query.all).await?))
}

async fn dismiss_alert(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Alert>, AppError> {
    Ok(Json(app_state.alerts.dismiss(id).await?))
}

async fn dismiss_all_alerts(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let dismissed = app_state.alerts.dismiss_all().await?;
    Ok(Json(json!({ "dismissed": dismissed })))
}
