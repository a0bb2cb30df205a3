mod alerting;
mod config;
mod db;
mod notifications;
mod scheduler;
mod server;
mod web;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::alerting::incident::IncidentTracker;
use crate::config::AppConfig;
use crate::notifications::dispatcher::NotificationDispatcher;
use crate::scheduler::executor::HttpProbeRunner;
use crate::scheduler::retention::RetentionStatus;
use crate::scheduler::{Scheduler, SchedulerConfig, SchedulerDeps};
use crate::server::event_bus::EventBus;
use crate::web::AppState;

#[derive(Parser, Debug)]
#[command(name = "pulsewatch", about = "HTTP endpoint monitor", version)]
struct Args {
    /// Override the PORT environment variable.
    #[arg(long)]
    port: Option<u16>,
}

fn init_logging() {
    // File: JSON, daily rotation. Stdout: human-readable.
    let file_appender = tracing_appender::rolling::daily("logs", "pulsewatch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging();

    let mut config = AppConfig::load()?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    db::schema::ensure_schema(&pool).await?;
    info!("Database ready.");

    let endpoints = Arc::new(db::services::endpoint_service::PgEndpointService::new(
        pool.clone(),
    ));
    let checks = Arc::new(db::services::check_service::PgCheckService::new(
        pool.clone(),
    ));
    let alerts = Arc::new(db::services::alert_service::PgAlertService::new(
        pool.clone(),
    ));
    let webhooks = Arc::new(db::services::webhook_service::PgWebhookService::new(
        pool.clone(),
    ));

    let bus = EventBus::new();
    let tracker = Arc::new(IncidentTracker::new(config.alert_cooldown_ms));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        webhooks,
        alerts,
        bus.clone(),
        config.alert_retry_count,
        Duration::from_millis(config.alert_retry_base_ms),
    ));
    let probe = Arc::new(HttpProbeRunner::new(Duration::from_millis(
        config.default_timeout_ms,
    )));
    let retention = Arc::new(RetentionStatus::new(config.retention_days));

    let scheduler = Scheduler::new(
        SchedulerDeps {
            endpoints,
            checks,
            probe,
            tracker,
            dispatcher,
            bus: bus.clone(),
        },
        SchedulerConfig {
            dispatch_delay: Duration::from_millis(config.dispatch_delay_ms),
            refresh_interval_ms: config.endpoint_refresh_ms,
            max_concurrency: config.max_concurrency,
        },
        retention.clone(),
    );
    scheduler.start();

    let app_state = AppState::new(pool, bus, scheduler, retention);
    let router = web::create_axum_router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening.");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
