use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Ring-buffer depth per subscriber. A subscriber that falls further behind
/// than this loses the oldest events (`RecvError::Lagged`); the publisher
/// never blocks.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Check,
    Alert,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Check => "check",
            EventKind::Alert => "alert",
        }
    }
}

/// One live event as seen by subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

/// Process-wide fan-out of check and alert events. Publishing is
/// fire-and-forget: events are not buffered for late subscribers, and a
/// publish with zero subscribers is a no-op.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, kind: EventKind, payload: serde_json::Value) {
        if self.tx.receiver_count() == 0 {
            debug!(kind = kind.as_str(), "No event subscribers, skipping publish.");
            return;
        }
        // send only fails when every receiver is gone, which the count
        // check above already covers up to a race; either way it is a no-op.
        let _ = self.tx.send(Event { kind, payload });
    }

    /// An independent, ordered stream of events starting now. Dropping the
    /// receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(EventKind::Check, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn each_subscriber_gets_its_own_ordered_stream() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(EventKind::Check, json!({ "seq": 1 }));
        bus.publish(EventKind::Alert, json!({ "seq": 2 }));

        for rx in [&mut first, &mut second] {
            let a = rx.recv().await.expect("first event");
            let b = rx.recv().await.expect("second event");
            assert_eq!(a.kind, EventKind::Check);
            assert_eq!(a.payload["seq"], 1);
            assert_eq!(b.kind, EventKind::Alert);
            assert_eq!(b.payload["seq"], 2);
        }
    }

    #[tokio::test]
    async fn late_subscribers_do_not_see_past_events() {
        let bus = EventBus::new();
        let mut early = bus.subscribe();
        bus.publish(EventKind::Check, json!({ "seq": 1 }));

        let mut late = bus.subscribe();
        bus.publish(EventKind::Check, json!({ "seq": 2 }));

        assert_eq!(early.recv().await.expect("event").payload["seq"], 1);
        assert_eq!(early.recv().await.expect("event").payload["seq"], 2);
        assert_eq!(late.recv().await.expect("event").payload["seq"], 2);
    }

    #[test]
    fn event_serializes_with_kind_tag() {
        let event = Event {
            kind: EventKind::Alert,
            payload: json!({ "message": "down" }),
        };
        let value = serde_json::to_value(&event).expect("serializable");
        assert_eq!(value["type"], "alert");
        assert_eq!(value["payload"]["message"], "down");
    }
}
