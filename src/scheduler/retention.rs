use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::db::services::CheckStore;

const SWEEP_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of the most recent sweep, surfaced by the health endpoint.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RetentionReport {
    pub last_prune_at: Option<DateTime<Utc>>,
    pub last_prune_error: Option<String>,
    pub retention_days: u32,
}

#[derive(Debug)]
pub struct RetentionStatus {
    retention_days: u32,
    inner: Mutex<(Option<DateTime<Utc>>, Option<String>)>,
}

impl RetentionStatus {
    pub fn new(retention_days: u32) -> Self {
        Self {
            retention_days,
            inner: Mutex::new((None, None)),
        }
    }

    pub fn report(&self) -> RetentionReport {
        let guard = self.inner.lock().expect("retention status lock poisoned");
        RetentionReport {
            last_prune_at: guard.0,
            last_prune_error: guard.1.clone(),
            retention_days: self.retention_days,
        }
    }

    fn record_success(&self, at: DateTime<Utc>) {
        let mut guard = self.inner.lock().expect("retention status lock poisoned");
        *guard = (Some(at), None);
    }

    fn record_error(&self, message: String) {
        let mut guard = self.inner.lock().expect("retention status lock poisoned");
        guard.1 = Some(message);
    }
}

/// Deletes checks older than the retention horizon and records the outcome.
pub async fn prune_old_checks(checks: &dyn CheckStore, status: &RetentionStatus) {
    let cutoff = Utc::now() - ChronoDuration::days(status.retention_days as i64);
    match checks.delete_older_than(cutoff).await {
        Ok(deleted) => {
            status.record_success(Utc::now());
            info!(deleted, cutoff = %cutoff, "Retention sweep completed.");
        }
        Err(e) => {
            status.record_error(e.to_string());
            error!(error = %e, "Retention sweep failed.");
        }
    }
}

/// Spawns the daily sweep. The first sweep runs one full period after
/// startup. The returned handle is aborted by the scheduler's `stop()`.
pub fn spawn_retention_job(
    checks: Arc<dyn CheckStore>,
    status: Arc<RetentionStatus>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(SWEEP_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Consume the immediate first tick so the period leads the sweep.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            prune_old_checks(checks.as_ref(), status.as_ref()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Check, CheckOutcome};
    use crate::db::services::StoreError;
    use async_trait::async_trait;
    use uuid::Uuid;

    struct StubChecks {
        fail: bool,
        last_cutoff: Mutex<Option<DateTime<Utc>>>,
    }

    #[async_trait]
    impl CheckStore for StubChecks {
        async fn create(&self, _: Uuid, _: &CheckOutcome) -> Result<Check, StoreError> {
            unreachable!("retention only deletes")
        }

        async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
            *self.last_cutoff.lock().unwrap() = Some(cutoff);
            if self.fail {
                Err(StoreError::InvalidInput("store offline".to_string()))
            } else {
                Ok(7)
            }
        }
    }

    #[tokio::test]
    async fn successful_sweep_records_timestamp_and_clears_error() {
        let checks = StubChecks {
            fail: false,
            last_cutoff: Mutex::new(None),
        };
        let status = RetentionStatus::new(30);
        status.record_error("previous failure".to_string());

        prune_old_checks(&checks, &status).await;

        let report = status.report();
        assert!(report.last_prune_at.is_some());
        assert_eq!(report.last_prune_error, None);
        assert_eq!(report.retention_days, 30);

        let cutoff = checks.last_cutoff.lock().unwrap().expect("cutoff captured");
        let expected = Utc::now() - ChronoDuration::days(30);
        assert!((cutoff - expected).num_seconds().abs() < 5);
    }

    #[tokio::test]
    async fn failed_sweep_records_error_but_keeps_last_success() {
        let ok = StubChecks {
            fail: false,
            last_cutoff: Mutex::new(None),
        };
        let failing = StubChecks {
            fail: true,
            last_cutoff: Mutex::new(None),
        };
        let status = RetentionStatus::new(7);

        prune_old_checks(&ok, &status).await;
        let first_success = status.report().last_prune_at;

        prune_old_checks(&failing, &status).await;
        let report = status.report();
        assert_eq!(report.last_prune_at, first_success);
        assert!(report.last_prune_error.as_deref().unwrap().contains("store offline"));
    }
}
