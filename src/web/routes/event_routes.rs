use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use futures::StreamExt;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use crate::server::event_bus::Event;
use crate::web::AppState;

pub fn event_router() -> Router<Arc<AppState>> {
    Router::new().route("/api/events", get(sse_handler))
}

/// Server-sent events feed of the live bus. Each bus event becomes a named
/// SSE event (`check` or `alert`) carrying the JSON payload. A subscriber
/// that falls behind loses the dropped events and keeps streaming.
async fn sse_handler(
    State(app_state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(app_state.bus.subscribe()).filter_map(|item| async move {
        match item {
            Ok(event) => Some(Ok(to_sse_event(&event))),
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                warn!(missed, "SSE subscriber lagged, events dropped.");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse_event(event: &Event) -> SseEvent {
    SseEvent::default()
        .event(event.kind.as_str())
        .data(event.payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::event_bus::EventKind;
    use serde_json::json;

    #[test]
    fn bus_events_become_named_sse_events() {
        let event = Event {
            kind: EventKind::Alert,
            payload: json!({ "message": "Endpoint down: api" }),
        };
        // The SSE builder is opaque; round-trip through Debug would be
        // brittle, so just assert construction does not panic and the
        // kind maps to the wire name we document.
        let _ = to_sse_event(&event);
        assert_eq!(event.kind.as_str(), "alert");
    }
}
