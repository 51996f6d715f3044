//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
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

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
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

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps counters to get a consistent snapshot.
pub struct Metrics {
    /// Total readings applied (monotonic)
    readings_total: AtomicU64,
    /// Readings since last report (reset on report)
    readings_since_report: AtomicU64,
    /// Sum of apply latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max apply latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Apply latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Scan points accepted into the profile (monotonic)
    scan_points_total: AtomicU64,
    /// Scan points discarded by the device dead-zone (monotonic)
    deadzone_dropped: AtomicU64,
    /// Envelope rebuilds triggered by readings (monotonic)
    envelope_recomputes: AtomicU64,
    /// Scan points found inside the envelope (monotonic)
    violations_total: AtomicU64,
    /// Payloads that failed to decode (monotonic)
    decode_errors: AtomicU64,
    /// Readings dropped because the session channel was full (monotonic)
    readings_dropped: AtomicU64,
    /// Completed scans (monotonic)
    scans_completed: AtomicU64,
    /// Time of last report
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            readings_total: AtomicU64::new(0),
            readings_since_report: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: Default::default(),
            scan_points_total: AtomicU64::new(0),
            deadzone_dropped: AtomicU64::new(0),
            envelope_recomputes: AtomicU64::new(0),
            violations_total: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            readings_dropped: AtomicU64::new(0),
            scans_completed: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a reading applied to the profile (lock-free)
    #[inline]
    pub fn record_reading_processed(&self, latency_us: u64) {
        self.readings_total.fetch_add(1, Ordering::Relaxed);
        self.readings_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
        self.latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_scan_point(&self) {
        self.scan_points_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_deadzone_dropped(&self) {
        self.deadzone_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_envelope_recompute(&self) {
        self.envelope_recomputes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_violations(&self, count: u64) {
        self.violations_total.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reading dropped due to a full session channel
    #[inline]
    pub fn record_reading_dropped(&self) {
        self.readings_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_scan_completed(&self) {
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn readings_total(&self) -> u64 {
        self.readings_total.load(Ordering::Relaxed)
    }

    pub fn scan_points_total(&self) -> u64 {
        self.scan_points_total.load(Ordering::Relaxed)
    }

    pub fn deadzone_dropped(&self) -> u64 {
        self.deadzone_dropped.load(Ordering::Relaxed)
    }

    pub fn envelope_recomputes(&self) -> u64 {
        self.envelope_recomputes.load(Ordering::Relaxed)
    }

    pub fn violations_total(&self) -> u64 {
        self.violations_total.load(Ordering::Relaxed)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    pub fn readings_dropped(&self) -> u64 {
        self.readings_dropped.load(Ordering::Relaxed)
    }

    pub fn scans_completed(&self) -> u64 {
        self.scans_completed.load(Ordering::Relaxed)
    }

    /// Generate a summary report and reset periodic counters
    pub fn report(&self) -> MetricsSummary {
        // Swap periodic counters to zero and get their values
        let readings_count = self.readings_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        // Calculate elapsed time and reset
        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let readings_per_sec = if elapsed.as_secs_f64() > 0.0 {
            readings_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let avg_latency = if readings_count > 0 { latency_sum / readings_count } else { 0 };

        MetricsSummary {
            readings_total: self.readings_total(),
            readings_per_sec,
            avg_latency_us: avg_latency,
            max_latency_us: max_latency,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            scan_points_total: self.scan_points_total(),
            deadzone_dropped: self.deadzone_dropped(),
            envelope_recomputes: self.envelope_recomputes(),
            violations_total: self.violations_total(),
            decode_errors: self.decode_errors(),
            readings_dropped: self.readings_dropped(),
            scans_completed: self.scans_completed(),
        }
    }
}

/// Summary of metrics for a reporting period
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub readings_total: u64,
    pub readings_per_sec: f64,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
    /// 50th percentile apply latency (µs)
    pub lat_p50_us: u64,
    /// 99th percentile apply latency (µs)
    pub lat_p99_us: u64,
    pub scan_points_total: u64,
    pub deadzone_dropped: u64,
    pub envelope_recomputes: u64,
    pub violations_total: u64,
    pub decode_errors: u64,
    pub readings_dropped: u64,
    pub scans_completed: u64,
}

impl MetricsSummary {
    /// Log the metrics summary
    pub fn log(&self) {
        info!(
            readings_total = %self.readings_total,
            readings_per_sec = format!("{:.1}", self.readings_per_sec),
            avg_latency_us = %self.avg_latency_us,
            max_latency_us = %self.max_latency_us,
            p50_us = %self.lat_p50_us,
            p99_us = %self.lat_p99_us,
            scan_points = %self.scan_points_total,
            deadzone_dropped = %self.deadzone_dropped,
            envelope_recomputes = %self.envelope_recomputes,
            violations = %self.violations_total,
            decode_errors = %self.decode_errors,
            readings_dropped = %self.readings_dropped,
            scans_completed = %self.scans_completed,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.readings_total(), 0);
        assert_eq!(metrics.scan_points_total(), 0);
    }

    #[test]
    fn test_record_reading() {
        let metrics = Metrics::new();

        metrics.record_reading_processed(100);
        assert_eq!(metrics.readings_total(), 1);
        assert_eq!(metrics.latency_sum_us.load(Ordering::Relaxed), 100);

        metrics.record_reading_processed(200);
        assert_eq!(metrics.readings_total(), 2);
        assert_eq!(metrics.latency_sum_us.load(Ordering::Relaxed), 300);
    }

    #[test]
    fn test_report() {
        let metrics = Metrics::new();

        metrics.record_reading_processed(100);
        metrics.record_reading_processed(200);
        metrics.record_reading_processed(300);
        metrics.record_scan_point();
        metrics.record_deadzone_dropped();
        metrics.record_violations(2);

        let summary = metrics.report();

        assert_eq!(summary.readings_total, 3);
        assert_eq!(summary.avg_latency_us, 200); // (100+200+300)/3
        assert_eq!(summary.max_latency_us, 300);
        assert_eq!(summary.scan_points_total, 1);
        assert_eq!(summary.deadzone_dropped, 1);
        assert_eq!(summary.violations_total, 2);

        // Periodic counters should be reset, monotonic ones kept
        assert_eq!(metrics.readings_since_report.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.latency_sum_us.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.latency_max_us.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.readings_total(), 3);
    }

    #[test]
    fn test_report_empty() {
        let summary = Metrics::new().report();
        assert_eq!(summary.readings_total, 0);
        assert_eq!(summary.avg_latency_us, 0);
        assert_eq!(summary.lat_p99_us, 0);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(50), 0);
        assert_eq!(bucket_index(100), 0);
        assert_eq!(bucket_index(101), 1);
        assert_eq!(bucket_index(60000), 10);
    }

    #[test]
    fn test_percentiles() {
        let mut buckets = [0u64; NUM_BUCKETS];
        buckets[0] = 90;
        buckets[5] = 10;
        assert_eq!(percentile_from_buckets(&buckets, 0.50), 100);
        assert_eq!(percentile_from_buckets(&buckets, 0.99), 3200);
    }
}
