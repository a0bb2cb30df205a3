use serde_json::{json, Value};

use crate::alerting::incident::AlertKind;
use crate::db::models::{Check, Endpoint};

/// The row-level, human-readable alert message.
pub fn alert_message(kind: AlertKind, endpoint: &Endpoint, duration: Option<&str>) -> String {
    match (kind, duration) {
        (AlertKind::Down, _) => format!("Endpoint down: {}", endpoint.name),
        (AlertKind::Reminder, Some(d)) => {
            format!("Endpoint still down: {} ({d})", endpoint.name)
        }
        (AlertKind::Reminder, None) => format!("Endpoint still down: {}", endpoint.name),
        (AlertKind::Recovery, Some(d)) => {
            format!("Endpoint recovered: {} ({d})", endpoint.name)
        }
        (AlertKind::Recovery, None) => format!("Endpoint recovered: {}", endpoint.name),
    }
}

fn header_text(kind: AlertKind, endpoint: &Endpoint) -> String {
    match kind {
        AlertKind::Down => format!("🚨 Endpoint Down: {}", endpoint.name),
        AlertKind::Reminder => format!("⏰ Still Down: {}", endpoint.name),
        AlertKind::Recovery => format!("✅ Recovered: {}", endpoint.name),
    }
}

/// Adaptive-card webhook payload. The fact list depends on the alert kind:
/// the error only matters while the endpoint is failing, the duration only
/// once an incident has an extent.
pub fn build_card(
    kind: AlertKind,
    endpoint: &Endpoint,
    check: &Check,
    duration: Option<&str>,
) -> Value {
    let mut facts = vec![
        json!({ "title": "URL", "value": endpoint.url }),
        json!({
            "title": "Status",
            "value": check
                .status_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
        }),
        json!({ "title": "Latency", "value": format!("{}ms", check.response_time_ms) }),
    ];

    if matches!(kind, AlertKind::Down | AlertKind::Reminder) {
        facts.push(json!({
            "title": "Error",
            "value": check.error.clone().unwrap_or_else(|| "None".to_string()),
        }));
    }
    if matches!(kind, AlertKind::Reminder | AlertKind::Recovery) {
        if let Some(d) = duration {
            facts.push(json!({ "title": "Duration", "value": d }));
        }
    }

    json!({
        "type": "message",
        "attachments": [{
            "contentType": "application/vnd.microsoft.card.adaptive",
            "content": {
                "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
                "type": "AdaptiveCard",
                "version": "1.4",
                "body": [
                    {
                        "type": "TextBlock",
                        "text": header_text(kind, endpoint),
                        "weight": "bolder",
                        "size": "large",
                    },
                    { "type": "FactSet", "facts": facts },
                ],
            },
        }],
    })
}
