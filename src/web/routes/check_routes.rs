use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::Check;
use crate::web::{AppError, AppState};

#[derive(Deserialize)]
pub struct CheckQuery {
    pub endpoint_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

pub fn check_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_checks))
}

async fn list_checks(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CheckQuery>,
) -> Result<Json<Vec<Check>>, AppError> {
    let rows = app_state
        .checks
        .list(query.endpoint_id, query.limit)
        .await?;
    Ok(Json(rows))
}
