use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::services::metrics_service::Metrics;
use crate::web::{AppError, AppState};

#[derive(Deserialize)]
pub struct MetricsQuery {
    pub endpoint_id: Option<Uuid>,
    #[serde(default = "default_hours")]
    pub hours: i64,
}

fn default_hours() -> i64 {
    24
}

pub fn metrics_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(metrics_summary))
}

async fn metrics_summary(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<Metrics>, AppError> {
    let metrics = app_state
        .metrics
        .summary(query.endpoint_id, query.hours)
        .await?;
    Ok(Json(metrics))
}
