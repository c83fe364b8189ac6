//! Update metrics tracking using OpenTelemetry.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector for [`Manager::update_now`](crate::core::Manager::update_now).
///
/// Tracks update attempts, outcomes, latencies, the number of changed keys per
/// swap and the number of live observers.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_konfig::metrics::UpdateMetrics;
/// use opentelemetry::global;
///
/// let metrics = UpdateMetrics::new(global::meter("hotswap-konfig"));
///
/// let timer = metrics.start_update();
/// // ... rebuild and swap ...
/// metrics.record_update_success(timer);
/// ```
#[derive(Clone)]
pub struct UpdateMetrics {
    update_attempts: Counter<u64>,
    update_success: Counter<u64>,
    update_failures: Counter<u64>,
    update_duration: Histogram<f64>,
    changed_keys: Histogram<u64>,
    snapshot_age_seconds: Gauge<i64>,
    live_observers: Gauge<i64>,
    last_swap: Arc<parking_lot::Mutex<Instant>>,
}

impl UpdateMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let update_attempts = meter
            .u64_counter("hotswap_konfig.update.attempts")
            .with_description("Total number of update attempts")
            .build();

        let update_success = meter
            .u64_counter("hotswap_konfig.update.success")
            .with_description("Number of updates that completed")
            .build();

        let update_failures = meter
            .u64_counter("hotswap_konfig.update.failures")
            .with_description("Number of failed updates")
            .build();

        let update_duration = meter
            .f64_histogram("hotswap_konfig.update.duration")
            .with_description("Duration of update operations in seconds")
            .with_unit("s")
            .build();

        let changed_keys = meter
            .u64_histogram("hotswap_konfig.update.changed_keys")
            .with_description("Number of keys changed by each snapshot swap")
            .build();

        let snapshot_age_seconds = meter
            .i64_gauge("hotswap_konfig.snapshot.age")
            .with_description("Time since the last snapshot swap in seconds")
            .with_unit("s")
            .build();

        let live_observers = meter
            .i64_gauge("hotswap_konfig.observers.live")
            .with_description("Number of registered observers still alive")
            .build();

        Self {
            update_attempts,
            update_success,
            update_failures,
            update_duration,
            changed_keys,
            snapshot_age_seconds,
            live_observers,
            last_swap: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    /// Start an update timer.
    ///
    /// Pass the returned `Instant` to `record_update_success` or
    /// `record_update_failure` when the update completes.
    pub fn start_update(&self) -> Instant {
        self.update_attempts.add(1, &[]);
        Instant::now()
    }

    /// Record an update that completed, whether or not anything changed.
    pub fn record_update_success(&self, start: Instant) {
        self.update_success.add(1, &[]);
        self.update_duration.record(start.elapsed().as_secs_f64(), &[]);
    }

    /// Record a failed update.
    pub fn record_update_failure(&self, start: Instant) {
        self.update_failures.add(1, &[]);
        self.update_duration.record(start.elapsed().as_secs_f64(), &[]);
    }

    /// Record a snapshot swap that changed `changed` keys.
    pub fn record_swap(&self, changed: usize) {
        self.changed_keys.record(changed as u64, &[]);
        *self.last_swap.lock() = Instant::now();
    }

    /// Update the number of live observers.
    pub fn update_observer_count(&self, count: i64) {
        self.live_observers.record(count, &[]);
    }

    /// Update the snapshot age metric.
    ///
    /// Call periodically to track how stale the active snapshot is.
    pub fn update_snapshot_age(&self) {
        let age_secs = self.last_swap.lock().elapsed().as_secs() as i64;
        self.snapshot_age_seconds.record(age_secs, &[]);
    }
}
