use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use tokio::time::sleep;
use tracing::warn;

use crate::db::models::{CheckOutcome, Endpoint};

/// Extra slack before the observability-only watchdog fires. It covers the
/// rare case where the transport ignores the request timeout; it never fails
/// the probe itself.
const WATCHDOG_GRACE: Duration = Duration::from_millis(1000);

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| Client::builder().build().unwrap_or_default());

/// Issues one probe per call. Infallible by contract: every failure mode is
/// folded into the returned outcome.
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint) -> CheckOutcome;
}

pub struct HttpProbeRunner {
    default_timeout: Duration,
}

impl HttpProbeRunner {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    fn timeout_for(&self, endpoint: &Endpoint) -> Duration {
        match endpoint.timeout_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms as u64),
            _ => self.default_timeout,
        }
    }
}

#[async_trait]
impl ProbeRunner for HttpProbeRunner {
    async fn probe(&self, endpoint: &Endpoint) -> CheckOutcome {
        let timeout = self.timeout_for(endpoint);
        let start = Instant::now();

        let watchdog = tokio::spawn({
            let endpoint_id = endpoint.id;
            async move {
                sleep(timeout + WATCHDOG_GRACE).await;
                warn!(endpoint_id = %endpoint_id, "Probe still outstanding past its timeout deadline.");
            }
        });

        let outcome = match build_request(endpoint, timeout).send().await {
            Ok(response) => {
                let elapsed = elapsed_ms(start);
                let status = response.status().as_u16() as i32;
                // Best-effort parse: a non-JSON body is not an error.
                let body = response.json::<serde_json::Value>().await.ok();
                CheckOutcome {
                    status_code: Some(status),
                    success: (200..300).contains(&status),
                    response_time_ms: elapsed,
                    response_body: body,
                    error: None,
                }
            }
            Err(e) => {
                let elapsed = elapsed_ms(start);
                let message = if e.is_timeout() {
                    "Request timed out".to_string()
                } else {
                    e.to_string()
                };
                warn!(
                    endpoint_id = %endpoint.id,
                    url = %endpoint.url,
                    headers = ?redact_headers(endpoint.header_map()),
                    error = %e,
                    "Probe request failed."
                );
                CheckOutcome {
                    status_code: None,
                    success: false,
                    response_time_ms: elapsed,
                    response_body: None,
                    error: Some(message),
                }
            }
        };

        watchdog.abort();
        outcome
    }
}

fn build_request(endpoint: &Endpoint, timeout: Duration) -> reqwest::RequestBuilder {
    let method = Method::from_bytes(endpoint.method.as_bytes()).unwrap_or(Method::GET);
    let mut headers = endpoint.header_map();
    let mut request = HTTP_CLIENT
        .request(method, &endpoint.url)
        .timeout(timeout);

    if let Some((bytes, file_name, field_name)) = endpoint.multipart_parts() {
        // The multipart boundary supplies the content type.
        headers.retain(|name, _| !name.eq_ignore_ascii_case("content-type"));
        let mime = endpoint
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        let part = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime)
            .unwrap_or_else(|_| {
                Part::bytes(bytes.to_vec()).file_name(file_name.to_string())
            });
        request = request.multipart(Form::new().part(field_name.to_string(), part));
    } else if let Some(payload) = &endpoint.payload {
        if !headers.keys().any(|name| name.eq_ignore_ascii_case("content-type")) {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }
        request = request.body(serde_json::to_vec(payload).unwrap_or_default());
    }

    let mut header_map = HeaderMap::new();
    for (name, value) in &headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            header_map.insert(name, value);
        }
    }
    request.headers(header_map)
}

fn elapsed_ms(start: Instant) -> i32 {
    (start.elapsed().as_secs_f64() * 1000.0).round() as i32
}

/// Secrets never reach the logs.
fn redact_headers(mut headers: HashMap<String, String>) -> HashMap<String, String> {
    for (name, value) in headers.iter_mut() {
        if name.eq_ignore_ascii_case("authorization") {
            *value = "[REDACTED]".to_string();
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::tests::sample_endpoint;
    use axum::extract::multipart::Multipart;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::HeaderMap as AxumHeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn runner() -> HttpProbeRunner {
        HttpProbeRunner::new(Duration::from_secs(30))
    }

    #[tokio::test]
    async fn successful_probe_parses_json_body() {
        let base = spawn_server(Router::new().route(
            "/health",
            get(|| async { Json(json!({ "status": "ok" })) }),
        ))
        .await;

        let mut endpoint = sample_endpoint();
        endpoint.url = format!("{base}/health");

        let outcome = runner().probe(&endpoint).await;
        assert_eq!(outcome.status_code, Some(200));
        assert!(outcome.success);
        assert_eq!(outcome.response_body, Some(json!({ "status": "ok" })));
        assert_eq!(outcome.error, None);
    }

    #[tokio::test]
    async fn non_2xx_status_is_a_failure_without_error() {
        let base = spawn_server(Router::new().route(
            "/health",
            get(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "nope") }),
        ))
        .await;

        let mut endpoint = sample_endpoint();
        endpoint.url = format!("{base}/health");

        let outcome = runner().probe(&endpoint).await;
        assert_eq!(outcome.status_code, Some(503));
        assert!(!outcome.success);
        // A reachable server is a transport success even when unhealthy.
        assert_eq!(outcome.error, None);
    }

    #[tokio::test]
    async fn non_json_body_yields_no_body_and_no_error() {
        let base = spawn_server(Router::new().route("/", get(|| async { "plain text" }))).await;

        let mut endpoint = sample_endpoint();
        endpoint.url = base;

        let outcome = runner().probe(&endpoint).await;
        assert!(outcome.success);
        assert_eq!(outcome.response_body, None);
        assert_eq!(outcome.error, None);
    }

    #[tokio::test]
    async fn timeout_produces_null_status_and_error() {
        let base = spawn_server(Router::new().route(
            "/slow",
            get(|| async {
                sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;

        let mut endpoint = sample_endpoint();
        endpoint.url = format!("{base}/slow");
        endpoint.timeout_ms = Some(200);

        let start = Instant::now();
        let outcome = runner().probe(&endpoint).await;
        let wall = start.elapsed();

        assert_eq!(outcome.status_code, None);
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert!(wall >= Duration::from_millis(200));
        assert!(wall < Duration::from_millis(1200), "timeout was not enforced: {wall:?}");
    }

    #[tokio::test]
    async fn transport_failure_is_captured_not_raised() {
        let mut endpoint = sample_endpoint();
        // Nothing listens here.
        endpoint.url = "http://127.0.0.1:1/health".to_string();

        let outcome = runner().probe(&endpoint).await;
        assert_eq!(outcome.status_code, None);
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn json_payload_defaults_content_type_only_when_absent() {
        let echo = |headers: AxumHeaderMap| async move {
            let content_type = headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            Json(json!({ "content_type": content_type }))
        };
        let base = spawn_server(Router::new().route("/echo", post(echo))).await;

        let mut endpoint = sample_endpoint();
        endpoint.method = "POST".to_string();
        endpoint.url = format!("{base}/echo");
        endpoint.payload = Some(json!({ "ping": true }));

        let outcome = runner().probe(&endpoint).await;
        assert_eq!(
            outcome.response_body.as_ref().unwrap()["content_type"],
            "application/json"
        );

        // A caller-provided content type wins.
        endpoint.headers = json!({ "Content-Type": "application/vnd.custom+json" });
        let outcome = runner().probe(&endpoint).await;
        assert_eq!(
            outcome.response_body.as_ref().unwrap()["content_type"],
            "application/vnd.custom+json"
        );
    }

    #[tokio::test]
    async fn file_probe_sends_multipart_under_the_configured_field() {
        let receive = |mut multipart: Multipart| async move {
            let field = multipart.next_field().await.unwrap().expect("one field");
            let name = field.name().unwrap_or("").to_string();
            let file_name = field.file_name().unwrap_or("").to_string();
            let bytes = field.bytes().await.unwrap();
            Json(json!({
                "field": name,
                "file_name": file_name,
                "size": bytes.len(),
            }))
        };
        let base = spawn_server(Router::new().route("/upload", post(receive))).await;

        let mut endpoint = sample_endpoint();
        endpoint.method = "POST".to_string();
        endpoint.url = format!("{base}/upload");
        endpoint.test_file = Some(vec![0u8; 16]);
        endpoint.test_file_name = Some("probe.bin".to_string());
        endpoint.form_field_name = Some("upload".to_string());
        // Must be stripped; the multipart boundary supplies the real one.
        endpoint.headers = json!({ "Content-Type": "application/json" });

        let outcome = runner().probe(&endpoint).await;
        assert!(outcome.success, "upload failed: {:?}", outcome.error);
        let body = outcome.response_body.expect("echo body");
        assert_eq!(body["field"], "upload");
        assert_eq!(body["file_name"], "probe.bin");
        assert_eq!(body["size"], 16);
    }

    #[test]
    fn authorization_header_is_redacted() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer secret".to_string());
        headers.insert("Accept".to_string(), "application/json".to_string());

        let redacted = redact_headers(headers);
        assert_eq!(redacted["Authorization"], "[REDACTED]");
        assert_eq!(redacted["Accept"], "application/json");
    }
}
