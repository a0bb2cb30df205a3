pub mod executor;
pub mod retention;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::alerting::incident::IncidentTracker;
use crate::db::models::Endpoint;
use crate::db::services::{CheckStore, EndpointStore};
use crate::notifications::dispatcher::NotificationDispatcher;
use crate::scheduler::executor::ProbeRunner;
use crate::scheduler::retention::{spawn_retention_job, RetentionStatus};
use crate::server::event_bus::{EventBus, EventKind};

/// Sleep while the concurrency cap is saturated. Deliberately much shorter
/// than the dispatch delay so a freed permit is picked up promptly.
const POLL_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub dispatch_delay: Duration,
    pub refresh_interval_ms: u64,
    pub max_concurrency: usize,
}

/// Everything one dispatched check touches. All trait objects so the loop is
/// testable without a database or network.
#[derive(Clone)]
pub struct SchedulerDeps {
    pub endpoints: Arc<dyn EndpointStore>,
    pub checks: Arc<dyn CheckStore>,
    pub probe: Arc<dyn ProbeRunner>,
    pub tracker: Arc<IncidentTracker>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub bus: EventBus,
}

/// An endpoint is due when it has never run or its interval has elapsed
/// since the last recorded dispatch.
fn is_due(last_run_ms: Option<i64>, interval_seconds: i32, now_ms: i64) -> bool {
    match last_run_ms {
        None => true,
        Some(last) => now_ms - last >= interval_seconds as i64 * 1000,
    }
}

fn needs_refresh(last_refresh_ms: Option<i64>, now_ms: i64, refresh_ms: u64) -> bool {
    match last_refresh_ms {
        None => true,
        Some(last) => now_ms - last >= refresh_ms as i64,
    }
}

fn wall_clock_ms() -> i64 {
    Utc::now().timestamp_millis()
}

type NowFn = Arc<dyn Fn() -> i64 + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    /// No endpoints to check; take the long sleep.
    EmptyCache,
    /// Concurrency cap saturated; cursor not advanced.
    AtCapacity,
    /// Cursor advanced, endpoint not yet due.
    NotDue,
    /// A check was launched.
    Dispatched,
}

/// One full round-robin pass over the cursor state. Owned exclusively by the
/// loop task, so none of this needs locking.
struct DispatchCore {
    deps: SchedulerDeps,
    semaphore: Arc<Semaphore>,
    refresh_interval_ms: u64,
    cursor: usize,
    cache: Vec<Endpoint>,
    last_refresh_ms: Option<i64>,
    last_run_ms: HashMap<Uuid, i64>,
    now_fn: NowFn,
}

impl DispatchCore {
    fn new(deps: SchedulerDeps, config: &SchedulerConfig) -> Self {
        Self {
            deps,
            semaphore: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            refresh_interval_ms: config.refresh_interval_ms,
            cursor: 0,
            cache: Vec::new(),
            last_refresh_ms: None,
            last_run_ms: HashMap::new(),
            now_fn: Arc::new(wall_clock_ms),
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, now_fn: NowFn) -> Self {
        self.now_fn = now_fn;
        self
    }

    async fn tick(&mut self) -> TickOutcome {
        let now = (self.now_fn)();
        if needs_refresh(self.last_refresh_ms, now, self.refresh_interval_ms) {
            self.refresh(now).await;
        }

        if self.cache.is_empty() {
            return TickOutcome::EmptyCache;
        }

        if self.semaphore.available_permits() == 0 {
            return TickOutcome::AtCapacity;
        }

        let endpoint = self.cache[self.cursor % self.cache.len()].clone();
        self.cursor = (self.cursor + 1) % self.cache.len();

        if !is_due(
            self.last_run_ms.get(&endpoint.id).copied(),
            endpoint.interval_seconds,
            now,
        ) {
            return TickOutcome::NotDue;
        }

        // Permits are only returned by check completions, so this cannot
        // fail after the capacity check above; bail out anyway if it does.
        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return TickOutcome::AtCapacity,
        };

        // Recorded before the check body runs: this is what keeps one
        // endpoint from being re-selected while its check is in flight.
        self.last_run_ms.insert(endpoint.id, (self.now_fn)());

        let deps = self.deps.clone();
        tokio::spawn(async move {
            // Dropped on every exit path, releasing the concurrency slot.
            let _permit = permit;
            run_check(deps, endpoint).await;
        });

        TickOutcome::Dispatched
    }

    /// Replaces the snapshot wholesale. Last-run stamps for surviving
    /// endpoints are kept so a refresh never perturbs their due times; a
    /// refresh failure keeps the stale cache and is retried next iteration.
    async fn refresh(&mut self, now: i64) {
        match self.deps.endpoints.list_active().await {
            Ok(endpoints) => {
                let surviving: HashSet<Uuid> = endpoints.iter().map(|e| e.id).collect();
                self.last_run_ms.retain(|id, _| surviving.contains(id));
                self.cache = endpoints;
                self.last_refresh_ms = Some(now);
                debug!(count = self.cache.len(), "Endpoint snapshot refreshed.");
            }
            Err(e) => {
                error!(error = %e, "Failed to refresh endpoints, keeping previous snapshot.");
            }
        }
    }
}

/// Body of one dispatched check: probe, persist, publish, evaluate. Nothing
/// here may propagate; a lost check is logged and the loop moves on.
async fn run_check(deps: SchedulerDeps, endpoint: Endpoint) {
    let outcome = deps.probe.probe(&endpoint).await;

    let check = match deps.checks.create(endpoint.id, &outcome).await {
        Ok(check) => check,
        Err(e) => {
            error!(endpoint_id = %endpoint.id, error = %e, "Failed to persist check.");
            return;
        }
    };

    match serde_json::to_value(&check) {
        Ok(payload) => deps.bus.publish(EventKind::Check, payload),
        Err(e) => error!(endpoint_id = %endpoint.id, error = %e, "Failed to serialize check event."),
    }

    if let Some(intent) = deps.tracker.observe(&endpoint, &outcome, Utc::now()) {
        deps.dispatcher.dispatch(&endpoint, &check, &intent).await;
    }
}

struct SchedulerInner {
    deps: SchedulerDeps,
    config: SchedulerConfig,
    running: AtomicBool,
    signals_installed: AtomicBool,
    retention_status: Arc<RetentionStatus>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheap-to-clone handle over the scheduler lifecycle.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(
        deps: SchedulerDeps,
        config: SchedulerConfig,
        retention_status: Arc<RetentionStatus>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                deps,
                config,
                running: AtomicBool::new(false),
                signals_installed: AtomicBool::new(false),
                retention_status,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Idempotent while running. Spawns the dispatch loop and the retention
    /// sweeper, and hooks process-termination signals to `stop()`.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }

        self.install_signal_handlers();

        let retention = spawn_retention_job(
            self.inner.deps.checks.clone(),
            self.inner.retention_status.clone(),
        );
        let loop_task = tokio::spawn(run_loop(self.inner.clone()));

        let mut tasks = self.inner.tasks.lock().expect("scheduler task lock poisoned");
        tasks.push(retention);
        tasks.push(loop_task);

        info!("Scheduler started.");
    }

    /// Idempotent while stopped. Halts the loop and cancels the retention
    /// sweeper; checks already in flight run to completion on their own.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let mut tasks = self.inner.tasks.lock().expect("scheduler task lock poisoned");
        for task in tasks.drain(..) {
            task.abort();
        }

        info!("Scheduler stopped.");
    }

    pub fn status(&self) -> &'static str {
        if self.inner.running.load(Ordering::SeqCst) {
            "running"
        } else {
            "stopped"
        }
    }

    fn install_signal_handlers(&self) {
        if self.inner.signals_installed.swap(true, Ordering::SeqCst) {
            return;
        }
        let handle = self.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Termination signal received, stopping scheduler.");
            handle.stop();
        });
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler.");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn run_loop(inner: Arc<SchedulerInner>) {
    let mut core = DispatchCore::new(inner.deps.clone(), &inner.config);
    info!(
        max_concurrency = inner.config.max_concurrency,
        dispatch_delay_ms = inner.config.dispatch_delay.as_millis() as u64,
        "Dispatch loop running."
    );

    while inner.running.load(Ordering::SeqCst) {
        let outcome = core.tick().await;
        let delay = match outcome {
            TickOutcome::AtCapacity => POLL_DELAY,
            _ => inner.config.dispatch_delay,
        };
        sleep(delay).await;
    }

    info!("Dispatch loop exited.");
}
