use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::db::models::Endpoint;
use crate::db::services::endpoint_service::{CreateEndpointRequest, UpdateEndpointRequest};
use crate::web::{AppError, AppState};

pub fn endpoint_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_endpoints).post(create_endpoint))
        .route("/{id}", get(get_endpoint).put(update_endpoint).delete(delete_endpoint))
}

async fn list_endpoints(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<Endpoint>>, AppError> {
    Ok(Json(app_state.endpoints.list_all().await?))
}

async fn get_endpoint(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Endpoint>, AppError> {
    Ok(Json(app_state.endpoints.get(id).await?))
}

async fn create_endpoint(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateEndpointRequest>,
) -> Result<(StatusCode, Json<Endpoint>), AppError> {
    let endpoint = app_state.endpoints.create(payload).await?;
    Ok((StatusCode::CREATED, Json(endpoint)))
}

async fn update_endpoint(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEndpointRequest>,
) -> Result<Json<Endpoint>, AppError> {
    Ok(Json(app_state.endpoints.update(id, payload).await?))
}

/// Soft delete: the row stays for check/alert history, the scheduler drops
/// it on its next snapshot refresh.
async fn delete_endpoint(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.endpoints.soft_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
