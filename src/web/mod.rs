use std::sync::Arc;

use axum::http::Method;
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::db::services::alert_service::PgAlertService;
use crate::db::services::check_service::PgCheckService;
use crate::db::services::endpoint_service::PgEndpointService;
use crate::db::services::metrics_service::PgMetricsService;
use crate::db::services::webhook_service::PgWebhookService;
use crate::scheduler::retention::RetentionStatus;
use crate::scheduler::Scheduler;
use crate::server::event_bus::EventBus;

pub mod error;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub endpoints: Arc<PgEndpointService>,
    pub checks: Arc<PgCheckService>,
    pub alerts: Arc<PgAlertService>,
    pub webhooks: Arc<PgWebhookService>,
    pub metrics: Arc<PgMetricsService>,
    pub bus: EventBus,
    pub scheduler: Scheduler,
    pub retention: Arc<RetentionStatus>,
}

impl AppState {
    pub fn new(
        db_pool: PgPool,
        bus: EventBus,
        scheduler: Scheduler,
        retention: Arc<RetentionStatus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            endpoints: Arc::new(PgEndpointService::new(db_pool.clone())),
            checks: Arc::new(PgCheckService::new(db_pool.clone())),
            alerts: Arc::new(PgAlertService::new(db_pool.clone())),
            webhooks: Arc::new(PgWebhookService::new(db_pool.clone())),
            metrics: Arc::new(PgMetricsService::new(db_pool.clone())),
            db_pool,
            bus,
            scheduler,
            retention,
        })
    }
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .merge(routes::health_routes::health_router())
        .merge(routes::event_routes::event_router())
        .nest("/api/endpoints", routes::endpoint_routes::endpoint_router())
        .nest("/api/checks", routes::check_routes::check_router())
        .nest("/api/alerts", routes::alert_routes::alert_router())
        .nest("/api/webhooks", routes::webhook_routes::webhook_router())
        .nest("/api/metrics", routes::metrics_routes::metrics_router())
        .with_state(app_state)
        .layer(cors)
}
