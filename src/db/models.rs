use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

/// A monitoring target. Only `active` rows are eligible for scheduling.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Endpoint {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub method: String,
    /// String-to-string header map, stored as JSONB.
    pub headers: serde_json::Value,
    pub payload: Option<serde_json::Value>,
    pub content_type: Option<String>,
    /// Optional file used to build a multipart probe body. Never serialized
    /// in API responses.
    #[serde(skip_serializing)]
    pub test_file: Option<Vec<u8>>,
    pub test_file_name: Option<String>,
    pub form_field_name: Option<String>,
    /// Per-endpoint probe timeout; the system default applies when unset.
    pub timeout_ms: Option<i32>,
    pub interval_seconds: i32,
    pub alert_on_failure: bool,
    pub alert_threshold_ms: Option<i32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Endpoint {
    /// The configured headers as a plain string map. Non-string values and
    /// non-object shapes are ignored rather than rejected.
    pub fn header_map(&self) -> HashMap<String, String> {
        match self.headers.as_object() {
            Some(map) => map
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
            None => HashMap::new(),
        }
    }

    /// A multipart body is only built when all three file fields are set.
    pub fn multipart_parts(&self) -> Option<(&[u8], &str, &str)> {
        match (
            self.test_file.as_deref(),
            self.test_file_name.as_deref(),
            self.form_field_name.as_deref(),
        ) {
            (Some(file), Some(name), Some(field)) => Some((file, name, field)),
            _ => None,
        }
    }
}

/// Outcome of one probe, before persistence assigns an id and timestamp.
/// Infallible by construction: transport failures land in `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub status_code: Option<i32>,
    pub success: bool,
    pub response_time_ms: i32,
    pub response_body: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// A persisted check row. Immutable once inserted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Check {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub status_code: Option<i32>,
    pub success: bool,
    pub response_time_ms: i32,
    pub response_body: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A notification record: one per channel delivery attempt, or a single
/// unsent row when no channels are configured.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Alert {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub message: String,
    pub alert_type: String,
    pub sent: bool,
    pub dismissed: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting an alert row.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub endpoint_id: Uuid,
    pub message: String,
    pub alert_type: String,
    pub sent: bool,
}

/// A registered notification channel.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookUrl {
    pub id: Uuid,
    pub url: String,
    pub label: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample_endpoint() -> Endpoint {
        Endpoint {
            id: Uuid::new_v4(),
            name: "api".to_string(),
            url: "http://localhost/health".to_string(),
            method: "GET".to_string(),
            headers: json!({}),
            payload: None,
            content_type: None,
            test_file: None,
            test_file_name: None,
            form_field_name: None,
            timeout_ms: Some(5000),
            interval_seconds: 60,
            alert_on_failure: true,
            alert_threshold_ms: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn header_map_keeps_only_string_values() {
        let mut endpoint = sample_endpoint();
        endpoint.headers = json!({ "Authorization": "Bearer x", "X-Retries": 3 });

        let map = endpoint.header_map();
        assert_eq!(map.get("Authorization").map(String::as_str), Some("Bearer x"));
        assert!(!map.contains_key("X-Retries"));
    }

    #[test]
    fn header_map_tolerates_non_object_shapes() {
        let mut endpoint = sample_endpoint();
        endpoint.headers = json!([1, 2, 3]);
        assert!(endpoint.header_map().is_empty());
    }

    #[test]
    fn multipart_requires_all_three_fields() {
        let mut endpoint = sample_endpoint();
        endpoint.test_file = Some(vec![1, 2, 3]);
        endpoint.test_file_name = Some("payload.bin".to_string());
        assert!(endpoint.multipart_parts().is_none());

        endpoint.form_field_name = Some("file".to_string());
        let (bytes, name, field) = endpoint.multipart_parts().expect("complete file config");
        assert_eq!(bytes, &[1, 2, 3]);
        assert_eq!(name, "payload.bin");
        assert_eq!(field, "file");
    }
}
