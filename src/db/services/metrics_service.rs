use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::StoreError;

/// Aggregate view over the most recent checks.
#[derive(Debug, Serialize, PartialEq)]
pub struct Metrics {
    pub uptime_percent: f64,
    pub latency_p50: Option<i32>,
    pub latency_p95: Option<i32>,
    pub latency_p99: Option<i32>,
    pub total_checks: usize,
}

#[derive(sqlx::FromRow)]
struct CheckSample {
    success: bool,
    response_time_ms: i32,
}

#[derive(Clone)]
pub struct PgMetricsService {
    pool: PgPool,
}

impl PgMetricsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Metrics over the trailing `hours` window, optionally scoped to one
    /// endpoint. `hours` is clamped to 1..=720; an empty window reads as
    /// fully up with no latency data.
    pub async fn summary(
        &self,
        endpoint_id: Option<Uuid>,
        hours: i64,
    ) -> Result<Metrics, StoreError> {
        let hours = hours.clamp(1, 720);
        let cutoff = chrono::Utc::now() - chrono::Duration::hours(hours);
        let samples = match endpoint_id {
            Some(id) => {
                sqlx::query_as::<_, CheckSample>(
                    "SELECT success, response_time_ms FROM checks \
                     WHERE endpoint_id = $1 AND created_at >= $2",
                )
                .bind(id)
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, CheckSample>(
                    "SELECT success, response_time_ms FROM checks WHERE created_at >= $1",
                )
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let latencies: Vec<i32> = samples.iter().map(|s| s.response_time_ms).collect();
        let successes = samples.iter().filter(|s| s.success).count();
        Ok(compute_metrics(successes, &latencies))
    }
}

fn compute_metrics(successes: usize, latencies: &[i32]) -> Metrics {
    if latencies.is_empty() {
        return Metrics {
            uptime_percent: 100.0,
            latency_p50: None,
            latency_p95: None,
            latency_p99: None,
            total_checks: 0,
        };
    }

    Metrics {
        uptime_percent: (successes as f64 / latencies.len() as f64) * 100.0,
        latency_p50: percentile(latencies, 50.0),
        latency_p95: percentile(latencies, 95.0),
        latency_p99: percentile(latencies, 99.0),
        total_checks: latencies.len(),
    }
}

/// Nearest-rank percentile over an unsorted sample.
fn percentile(values: &[i32], p: f64) -> Option<i32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    Some(sorted[idx.saturating_sub(1)])
}
