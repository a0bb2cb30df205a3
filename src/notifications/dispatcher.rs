use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use once_cell::sync::Lazy;
use reqwest::Client;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::alerting::incident::{format_duration, AlertIntent};
use crate::db::models::{Check, Endpoint, NewAlert};
use crate::db::services::{AlertStore, WebhookStore};
use crate::notifications::message::{alert_message, build_card};
use crate::server::event_bus::{EventBus, EventKind};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(WEBHOOK_TIMEOUT)
        .build()
        .unwrap_or_default()
});

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Request error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Fans one alert out to every active notification channel, with bounded
/// retry per channel, and records each channel's outcome as an alert row.
pub struct NotificationDispatcher {
    webhooks: Arc<dyn WebhookStore>,
    alerts: Arc<dyn AlertStore>,
    bus: EventBus,
    retry_count: u32,
    retry_base: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        webhooks: Arc<dyn WebhookStore>,
        alerts: Arc<dyn AlertStore>,
        bus: EventBus,
        retry_count: u32,
        retry_base: Duration,
    ) -> Self {
        Self {
            webhooks,
            alerts,
            bus,
            // At least one attempt is always made.
            retry_count: retry_count.max(1),
            retry_base,
        }
    }

    /// Never returns an error: delivery failures become `sent = false` rows,
    /// store failures are logged and the alert is lost for this cycle.
    pub async fn dispatch(&self, endpoint: &Endpoint, check: &Check, intent: &AlertIntent) {
        let duration = intent.elapsed.map(format_duration);
        let message = alert_message(intent.kind, endpoint, duration.as_deref());

        let webhooks = match self.webhooks.list_active().await {
            Ok(webhooks) => webhooks,
            Err(e) => {
                error!(endpoint_id = %endpoint.id, error = %e, "Failed to load notification channels.");
                return;
            }
        };

        if webhooks.is_empty() {
            // Record the event anyway so it is not silently lost.
            self.record(endpoint, intent, &message, false).await;
            return;
        }

        let payload = build_card(intent.kind, endpoint, check, duration.as_deref());
        let deliveries = webhooks
            .iter()
            .map(|webhook| self.deliver_with_retry(&webhook.url, &payload));
        let outcomes = join_all(deliveries).await;

        for (webhook, outcome) in webhooks.iter().zip(outcomes) {
            let sent = match outcome {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        endpoint_id = %endpoint.id,
                        url = %webhook.url,
                        error = %e,
                        "Alert delivery failed after all retries."
                    );
                    false
                }
            };
            self.record(endpoint, intent, &message, sent).await;
        }
    }

    async fn deliver_with_retry(&self, url: &str, payload: &serde_json::Value) -> Result<(), DeliveryError> {
        for attempt in 1..=self.retry_count {
            match self.post(url, payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, url, error = %e, "Webhook delivery attempt failed.");
                    if attempt == self.retry_count {
                        return Err(e);
                    }
                    // Linear backoff: base × attempt number.
                    sleep(self.retry_base * attempt).await;
                }
            }
        }
        Ok(())
    }

    async fn post(&self, url: &str, payload: &serde_json::Value) -> Result<(), DeliveryError> {
        HTTP_CLIENT
            .post(url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn record(&self, endpoint: &Endpoint, intent: &AlertIntent, message: &str, sent: bool) {
        let new_alert = NewAlert {
            endpoint_id: endpoint.id,
            message: message.to_string(),
            alert_type: intent.kind.as_str().to_string(),
            sent,
        };
        match self.alerts.create(new_alert).await {
            Ok(alert) => {
                info!(
                    endpoint_id = %endpoint.id,
                    alert_type = intent.kind.as_str(),
                    sent,
                    "Alert recorded."
                );
                match serde_json::to_value(&alert) {
                    Ok(payload) => self.bus.publish(EventKind::Alert, payload),
                    Err(e) => error!(error = %e, "Failed to serialize alert event."),
                }
            }
            Err(e) => {
                error!(endpoint_id = %endpoint.id, error = %e, "Failed to persist alert.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::incident::AlertKind;
    use crate::db::models::tests::sample_endpoint;
    use crate::db::services::StoreError;
    use crate::db::models::{Alert, WebhookUrl};
    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, routing::post, Router};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    struct FixedWebhooks(Vec<WebhookUrl>);

    #[async_trait]
    impl WebhookStore for FixedWebhooks {
        async fn list_active(&self) -> Result<Vec<WebhookUrl>, StoreError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingAlerts(Mutex<Vec<NewAlert>>);

    #[async_trait]
    impl AlertStore for RecordingAlerts {
        async fn create(&self, alert: NewAlert) -> Result<Alert, StoreError> {
            let row = Alert {
                id: Uuid::new_v4(),
                endpoint_id: alert.endpoint_id,
                message: alert.message.clone(),
                alert_type: alert.alert_type.clone(),
                sent: alert.sent,
                dismissed: false,
                created_at: Utc::now(),
            };
            self.0.lock().unwrap().push(alert);
            Ok(row)
        }
    }

    fn webhook(url: &str) -> WebhookUrl {
        WebhookUrl {
            id: Uuid::new_v4(),
            url: url.to_string(),
            label: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    fn sample_check(endpoint_id: Uuid) -> Check {
        Check {
            id: Uuid::new_v4(),
            endpoint_id,
            status_code: None,
            success: false,
            response_time_ms: 5000,
            response_body: None,
            error: Some("timeout".to_string()),
            created_at: Utc::now(),
        }
    }

    fn down_intent() -> AlertIntent {
        AlertIntent {
            kind: AlertKind::Down,
            elapsed: None,
        }
    }

    async fn spawn_receiver(status: StatusCode) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let app = Router::new()
            .route(
                "/hook",
                post(move |State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    status
                }),
            )
            .with_state(hits_clone);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/hook"), hits)
    }

    #[tokio::test]
    async fn zero_channels_records_exactly_one_unsent_alert() {
        let alerts = Arc::new(RecordingAlerts::default());
        let dispatcher = NotificationDispatcher::new(
            Arc::new(FixedWebhooks(vec![])),
            alerts.clone(),
            EventBus::new(),
            3,
            Duration::from_millis(1),
        );

        let endpoint = sample_endpoint();
        let check = sample_check(endpoint.id);
        dispatcher.dispatch(&endpoint, &check, &down_intent()).await;

        let recorded = alerts.0.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(!recorded[0].sent);
        assert_eq!(recorded[0].alert_type, "down");
    }

    #[tokio::test]
    async fn delivered_channel_yields_sent_alert_and_event() {
        let (url, hits) = spawn_receiver(StatusCode::OK).await;
        let alerts = Arc::new(RecordingAlerts::default());
        let bus = EventBus::new();
        let mut events = bus.subscribe();

        let dispatcher = NotificationDispatcher::new(
            Arc::new(FixedWebhooks(vec![webhook(&url)])),
            alerts.clone(),
            bus,
            3,
            Duration::from_millis(1),
        );

        let endpoint = sample_endpoint();
        let check = sample_check(endpoint.id);
        dispatcher.dispatch(&endpoint, &check, &down_intent()).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let recorded = alerts.0.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].sent);

        let event = events.recv().await.expect("alert event");
        assert_eq!(event.kind, EventKind::Alert);
        assert_eq!(event.payload["sent"], true);
    }

    #[tokio::test]
    async fn failing_channel_retries_then_records_unsent() {
        let (url, hits) = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR).await;
        let alerts = Arc::new(RecordingAlerts::default());
        let dispatcher = NotificationDispatcher::new(
            Arc::new(FixedWebhooks(vec![webhook(&url)])),
            alerts.clone(),
            EventBus::new(),
            3,
            Duration::from_millis(1),
        );

        let endpoint = sample_endpoint();
        let check = sample_check(endpoint.id);
        dispatcher.dispatch(&endpoint, &check, &down_intent()).await;

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        let recorded = alerts.0.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(!recorded[0].sent);
    }

    #[tokio::test]
    async fn every_channel_gets_its_own_alert_row() {
        let (ok_url, _) = spawn_receiver(StatusCode::OK).await;
        let (bad_url, _) = spawn_receiver(StatusCode::BAD_GATEWAY).await;
        let alerts = Arc::new(RecordingAlerts::default());
        let dispatcher = NotificationDispatcher::new(
            Arc::new(FixedWebhooks(vec![webhook(&ok_url), webhook(&bad_url)])),
            alerts.clone(),
            EventBus::new(),
            2,
            Duration::from_millis(1),
        );

        let endpoint = sample_endpoint();
        let check = sample_check(endpoint.id);
        dispatcher.dispatch(&endpoint, &check, &down_intent()).await;

        let recorded = alerts.0.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        let sent_flags: Vec<bool> = recorded.iter().map(|a| a.sent).collect();
        assert!(sent_flags.contains(&true));
        assert!(sent_flags.contains(&false));
    }
}
