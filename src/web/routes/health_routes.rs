use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;
use tracing::warn;

use crate::web::AppState;

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new().route("/api/health", get(health_handler))
}

/// Liveness plus a snapshot of the moving parts. Always 200; a broken
/// database shows up in the body rather than failing the probe.
async fn health_handler(State(app_state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let db = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&app_state.db_pool)
        .await
    {
        Ok(_) => "ok",
        Err(e) => {
            warn!(error = %e, "Health database probe failed.");
            "error"
        }
    };

    Json(json!({
        "db": db,
        "scheduler": app_state.scheduler.status(),
        "retention": app_state.retention.report(),
    }))
}
