//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//!
//! NOTE: All atomics use Relaxed ordering intentionally; these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Confirmation latency bucket boundaries (milliseconds)
/// Buckets: ≤1000, ≤2500, ≤5000, ≤10000, ≤15000, ≤20000, ≤30000, ≤45000, ≤60000, ≤90000, >90000
pub const CONFIRM_BUCKET_BOUNDS: [u64; 10] =
    [1_000, 2_500, 5_000, 10_000, 15_000, 20_000, 30_000, 45_000, 60_000, 90_000];
pub const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    CONFIRM_BUCKET_BOUNDS.partition_point(|&bound| bound < latency_ms)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Load all bucket values without resetting
#[inline]
fn load_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.load(Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;

    // Last bucket uses 2x the previous bound
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [1_000, 2_500, 5_000, 10_000, 15_000, 20_000, 30_000, 45_000, 60_000, 90_000, 180_000];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Location updates received from the transport
    updates_received: AtomicU64,
    /// Updates dropped before reaching the dispatcher (channel full)
    updates_dropped: AtomicU64,
    /// Coordinate payloads that failed to parse
    parse_errors: AtomicU64,
    /// Updates for vehicle ids not in the configuration
    unknown_vehicle: AtomicU64,
    /// Evaluation tasks spawned
    evaluations_scheduled: AtomicU64,
    /// Evaluations dropped because an actuation or cooldown was in progress
    evaluations_skipped: AtomicU64,
    /// Open/close decisions taken by the geofence engine
    actions_decided: AtomicU64,
    /// Commands actually sent to the door backend
    commands_issued: AtomicU64,
    /// Door already in the desired state
    noop_acks: AtomicU64,
    /// Door in a transitional state, nothing done
    indeterminate: AtomicU64,
    /// Authentication or device errors
    failures: AtomicU64,
    /// Door never reached the desired state in time
    timeouts: AtomicU64,
    /// Issue-to-confirmed latency histogram (ms)
    confirm_buckets: [AtomicU64; NUM_BUCKETS],
    confirm_sum_ms: AtomicU64,
    confirm_max_ms: AtomicU64,
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
    /// updates_received at last report, for rate calculation
    last_report_updates: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            updates_received: AtomicU64::new(0),
            updates_dropped: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            unknown_vehicle: AtomicU64::new(0),
            evaluations_scheduled: AtomicU64::new(0),
            evaluations_skipped: AtomicU64::new(0),
            actions_decided: AtomicU64::new(0),
            commands_issued: AtomicU64::new(0),
            noop_acks: AtomicU64::new(0),
            indeterminate: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            confirm_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            confirm_sum_ms: AtomicU64::new(0),
            confirm_max_ms: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
            last_report_updates: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_update_received(&self) {
        self.updates_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_update_dropped(&self) {
        self.updates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unknown_vehicle(&self) {
        self.unknown_vehicle.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evaluation_scheduled(&self) {
        self.evaluations_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evaluation_skipped(&self) {
        self.evaluations_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_action_decided(&self) {
        self.actions_decided.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_command_issued(&self) {
        self.commands_issued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_noop_ack(&self) {
        self.noop_acks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_indeterminate(&self) {
        self.indeterminate.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record time from command issue to observed terminal state
    #[inline]
    pub fn record_confirmation(&self, latency_ms: u64) {
        self.confirm_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.confirm_buckets[bucket_index(latency_ms)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.confirm_max_ms, latency_ms);
    }

    pub fn commands_issued(&self) -> u64 {
        self.commands_issued.load(Ordering::Relaxed)
    }

    pub fn evaluations_skipped(&self) -> u64 {
        self.evaluations_skipped.load(Ordering::Relaxed)
    }

    /// Snapshot all counters and reset the update-rate window
    pub fn report(&self) -> MetricsSummary {
        let updates_received = self.updates_received.load(Ordering::Relaxed);
        let previous = self.last_report_updates.swap(updates_received, Ordering::Relaxed);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let updates_per_min = if elapsed.as_secs_f64() > 0.0 {
            updates_received.saturating_sub(previous) as f64 * 60.0 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        self.summarize(updates_per_min)
    }

    /// Snapshot all counters without touching the rate window (rate reads 0)
    pub fn snapshot(&self) -> MetricsSummary {
        self.summarize(0.0)
    }

    fn summarize(&self, updates_per_min: f64) -> MetricsSummary {
        let updates_received = self.updates_received.load(Ordering::Relaxed);
        let confirm_buckets = load_buckets(&self.confirm_buckets);
        let confirmed: u64 = confirm_buckets.iter().sum();
        let confirm_sum_ms = self.confirm_sum_ms.load(Ordering::Relaxed);
        let confirm_avg_ms = if confirmed > 0 { confirm_sum_ms / confirmed } else { 0 };

        MetricsSummary {
            updates_received,
            updates_per_min,
            updates_dropped: self.updates_dropped.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            unknown_vehicle: self.unknown_vehicle.load(Ordering::Relaxed),
            evaluations_scheduled: self.evaluations_scheduled.load(Ordering::Relaxed),
            evaluations_skipped: self.evaluations_skipped.load(Ordering::Relaxed),
            actions_decided: self.actions_decided.load(Ordering::Relaxed),
            commands_issued: self.commands_issued.load(Ordering::Relaxed),
            noop_acks: self.noop_acks.load(Ordering::Relaxed),
            indeterminate: self.indeterminate.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            confirm_p95_ms: percentile_from_buckets(&confirm_buckets, 0.95),
            confirm_buckets,
            confirm_sum_ms,
            confirm_avg_ms,
            confirm_max_ms: self.confirm_max_ms.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the collector
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub updates_received: u64,
    pub updates_per_min: f64,
    pub updates_dropped: u64,
    pub parse_errors: u64,
    pub unknown_vehicle: u64,
    pub evaluations_scheduled: u64,
    pub evaluations_skipped: u64,
    pub actions_decided: u64,
    pub commands_issued: u64,
    pub noop_acks: u64,
    pub indeterminate: u64,
    pub failures: u64,
    pub timeouts: u64,
    /// Confirmation latency histogram buckets (see `CONFIRM_BUCKET_BOUNDS`)
    pub confirm_buckets: [u64; NUM_BUCKETS],
    pub confirm_sum_ms: u64,
    pub confirm_avg_ms: u64,
    pub confirm_max_ms: u64,
    pub confirm_p95_ms: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            updates_total = %self.updates_received,
            updates_per_min = format!("{:.1}", self.updates_per_min),
            dropped = %self.updates_dropped,
            parse_errors = %self.parse_errors,
            unknown_vehicle = %self.unknown_vehicle,
            evaluations = %self.evaluations_scheduled,
            skipped_in_flight = %self.evaluations_skipped,
            decided = %self.actions_decided,
            commands = %self.commands_issued,
            noops = %self.noop_acks,
            indeterminate = %self.indeterminate,
            failures = %self.failures,
            timeouts = %self.timeouts,
            confirm_p95_ms = %self.confirm_p95_ms,
            "metrics"
        );
    }
}
