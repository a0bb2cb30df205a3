pub mod alert_routes;
pub mod check_routes;
pub mod endpoint_routes;
pub mod event_routes;
pub mod health_routes;
pub mod metrics_routes;
pub mod webhook_routes;
