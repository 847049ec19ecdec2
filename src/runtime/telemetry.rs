use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(30);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Run-wide counters shared by the dispatcher, the jobs, and the reporter.
#[derive(Default, Debug)]
pub struct Telemetry {
    jobs_launched: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    entries_committed: AtomicU64,
    entries_revealed: AtomicU64,
    source_errors: AtomicU64,
}

impl Telemetry {
    pub fn record_job_launched(&self) {
        self.jobs_launched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_succeeded(&self) {
        self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit(&self) {
        self.entries_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reveal(&self) {
        self.entries_revealed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source_error(&self) {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            jobs_launched: self.jobs_launched.load(Ordering::Relaxed),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            entries_committed: self.entries_committed.load(Ordering::Relaxed),
            entries_revealed: self.entries_revealed.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
        }
    }

    /// Jobs launched that have not yet reached a terminal outcome.
    pub fn in_flight(&self) -> u64 {
        self.snapshot().in_flight()
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub jobs_launched: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub entries_committed: u64,
    pub entries_revealed: u64,
    pub source_errors: u64,
}

impl TelemetrySnapshot {
    pub fn in_flight(&self) -> u64 {
        self.jobs_launched
            .saturating_sub(self.jobs_succeeded)
            .saturating_sub(self.jobs_failed)
    }
}

/// Spawns a background task that periodically logs job progress and submission counts.
pub fn spawn_metrics_reporter(
    telemetry: Arc<Telemetry>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_snapshot = telemetry.snapshot();
        let mut last_tick = Instant::now();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "apiwatch::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let current = telemetry.snapshot();
                    let finished_delta = (current.jobs_succeeded + current.jobs_failed)
                        .saturating_sub(last_snapshot.jobs_succeeded + last_snapshot.jobs_failed);
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    let throughput = if elapsed <= f64::EPSILON {
                        0.0
                    } else {
                        finished_delta as f64 / elapsed
                    };

                    tracing::info!(
                        target: "apiwatch::metrics",
                        throughput = format!("{throughput:.2}"),
                        launched = current.jobs_launched,
                        in_flight = current.in_flight(),
                        succeeded = current.jobs_succeeded,
                        failed = current.jobs_failed,
                        committed = current.entries_committed,
                        revealed = current.entries_revealed,
                        source_errors = current.source_errors,
                        "runtime metrics snapshot"
                    );

                    last_snapshot = current;
                    last_tick = Instant::now();
                }
            }
        }
    })
}
