use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::db::models::{CheckOutcome, Endpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Down,
    Reminder,
    Recovery,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Down => "down",
            AlertKind::Reminder => "reminder",
            AlertKind::Recovery => "recovery",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthStatus {
    #[default]
    Healthy,
    Down,
}

/// Per-endpoint incident bookkeeping. In-memory only: a restart re-baselines
/// every endpoint to healthy, so the next failing check opens a fresh
/// incident instead of continuing a stale one.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncidentState {
    pub status: HealthStatus,
    pub down_since: Option<DateTime<Utc>>,
    pub last_alert_at: Option<DateTime<Utc>>,
}

/// What a completed check asks the notification pipeline to do.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertIntent {
    pub kind: AlertKind,
    /// Time since the incident opened; set for reminders and recoveries.
    pub elapsed: Option<Duration>,
}

/// Result of applying one check to an incident state.
#[derive(Debug, Clone, PartialEq)]
enum Transition {
    Quiet,
    Raise(AlertIntent),
    SuppressedReminder,
}

/// A check counts as a failure when it did not succeed, or when it exceeded
/// the endpoint's latency alert threshold.
fn is_failure(endpoint: &Endpoint, outcome: &CheckOutcome) -> bool {
    if !outcome.success {
        return true;
    }
    match endpoint.alert_threshold_ms {
        Some(threshold) => outcome.response_time_ms > threshold,
        None => false,
    }
}

fn cooldown_elapsed(state: &IncidentState, now: DateTime<Utc>, cooldown_ms: u64) -> bool {
    match state.last_alert_at {
        None => true,
        Some(last) => {
            let elapsed = now.signed_duration_since(last);
            elapsed >= Duration::zero()
                && elapsed.num_milliseconds() as u128 >= cooldown_ms as u128
        }
    }
}

/// Pure transition function: (state, check, now) → (next state, action).
fn evaluate(
    state: IncidentState,
    endpoint: &Endpoint,
    outcome: &CheckOutcome,
    now: DateTime<Utc>,
    cooldown_ms: u64,
) -> (IncidentState, Transition) {
    let failed = is_failure(endpoint, outcome);

    match (state.status, failed) {
        (HealthStatus::Healthy, false) => (state, Transition::Quiet),
        (HealthStatus::Healthy, true) => {
            let next = IncidentState {
                status: HealthStatus::Down,
                down_since: Some(now),
                last_alert_at: Some(now),
            };
            (
                next,
                Transition::Raise(AlertIntent {
                    kind: AlertKind::Down,
                    elapsed: None,
                }),
            )
        }
        (HealthStatus::Down, true) => {
            if cooldown_elapsed(&state, now, cooldown_ms) {
                let elapsed = state.down_since.map(|since| now.signed_duration_since(since));
                let next = IncidentState {
                    last_alert_at: Some(now),
                    ..state
                };
                (
                    next,
                    Transition::Raise(AlertIntent {
                        kind: AlertKind::Reminder,
                        elapsed,
                    }),
                )
            } else {
                (state, Transition::SuppressedReminder)
            }
        }
        (HealthStatus::Down, false) => {
            let elapsed = state.down_since.map(|since| now.signed_duration_since(since));
            (
                IncidentState::default(),
                Transition::Raise(AlertIntent {
                    kind: AlertKind::Recovery,
                    elapsed,
                }),
            )
        }
    }
}

/// Converts the raw check stream into a deduplicated alert stream: one `down`
/// per incident, cooldown-gated reminders while it lasts, one `recovery` when
/// it closes.
pub struct IncidentTracker {
    states: DashMap<Uuid, IncidentState>,
    cooldown_ms: u64,
}

impl IncidentTracker {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            states: DashMap::new(),
            cooldown_ms,
        }
    }

    /// Applies one completed check. Returns the alert to raise, if any.
    ///
    /// Endpoints with alerting disabled are bypassed entirely: no state is
    /// accrued, so re-enabling alerts later starts from healthy.
    pub fn observe(
        &self,
        endpoint: &Endpoint,
        outcome: &CheckOutcome,
        now: DateTime<Utc>,
    ) -> Option<AlertIntent> {
        if !endpoint.alert_on_failure {
            return None;
        }

        // The entry guard serializes transitions per endpoint id.
        let mut entry = self.states.entry(endpoint.id).or_default();
        let (next, transition) = evaluate(*entry, endpoint, outcome, now, self.cooldown_ms);
        *entry = next;
        drop(entry);

        match transition {
            Transition::Quiet => None,
            Transition::Raise(intent) => Some(intent),
            Transition::SuppressedReminder => {
                debug!(
                    endpoint_id = %endpoint.id,
                    "Reminder suppressed, cooldown not elapsed."
                );
                None
            }
        }
    }

    #[cfg(test)]
    fn state(&self, endpoint_id: Uuid) -> Option<IncidentState> {
        self.states.get(&endpoint_id).map(|s| *s)
    }
}

/// Human-readable incident duration: seconds under a minute, minutes under an
/// hour, otherwise hours with a minute remainder when nonzero.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);
    if total_seconds < 60 {
        return format!("{total_seconds}s");
    }
    let total_minutes = total_seconds / 60;
    if total_minutes < 60 {
        return format!("{total_minutes}m");
    }
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if minutes == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h {minutes}m")
    }
}
