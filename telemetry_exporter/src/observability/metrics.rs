use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const MAX_LATENCY_SAMPLES: usize = 1000;

/// Delivery latency of exported batches, from seal to accepted response.
#[derive(Debug, Clone)]
pub struct ExportLatency {
    pub count: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
    pub samples: Vec<Duration>,
}

impl Default for ExportLatency {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportLatency {
    pub fn new() -> Self {
        Self {
            count: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
            samples: Vec::new(),
        }
    }

    pub fn record(&mut self, latency: Duration) {
        self.count += 1;
        self.total = self.total.saturating_add(latency);

        if latency < self.min {
            self.min = latency;
        }
        if latency > self.max {
            self.max = latency;
        }

        self.samples.push(latency);
        if self.samples.len() > MAX_LATENCY_SAMPLES {
            self.samples.remove(0);
        }
    }

    pub fn average(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total.as_nanos() / u128::from(self.count);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Percentile over the retained samples; `p` is clamped to `0.0..=100.0`.
    pub fn percentile(&self, p: f64) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }

        let mut sorted = self.samples.clone();
        sorted.sort();

        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
        let index = ((sorted.len() - 1) as f64 * p / 100.0) as usize;
        sorted[index.min(sorted.len() - 1)]
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p95(&self) -> Duration {
        self.percentile(95.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

/// Point-in-time copy of the exporter counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_accepted: u64,
    pub records_rejected: u64,
    pub batches_sealed: u64,
    pub batches_dropped_overload: u64,
    pub records_dropped_overload: u64,
    pub batches_delivered: u64,
    pub records_delivered: u64,
    pub batches_failed: u64,
    pub batches_rejected: u64,
    pub export_attempts: u64,
    pub export_retries: u64,
    pub batches_lost_on_shutdown: u64,
    pub records_lost_on_shutdown: u64,
}

/// Counters shared by the accumulator, the sender and the worker.
pub struct ExporterMetrics {
    records_accepted: AtomicU64,
    records_rejected: AtomicU64,
    batches_sealed: AtomicU64,
    batches_dropped_overload: AtomicU64,
    records_dropped_overload: AtomicU64,
    batches_delivered: AtomicU64,
    records_delivered: AtomicU64,
    batches_failed: AtomicU64,
    batches_rejected: AtomicU64,
    export_attempts: AtomicU64,
    export_retries: AtomicU64,
    batches_lost_on_shutdown: AtomicU64,
    records_lost_on_shutdown: AtomicU64,
    latency: Mutex<ExportLatency>,
    start_time: Instant,
}

impl ExporterMetrics {
    pub fn new() -> Self {
        Self {
            records_accepted: AtomicU64::new(0),
            records_rejected: AtomicU64::new(0),
            batches_sealed: AtomicU64::new(0),
            batches_dropped_overload: AtomicU64::new(0),
            records_dropped_overload: AtomicU64::new(0),
            batches_delivered: AtomicU64::new(0),
            records_delivered: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            batches_rejected: AtomicU64::new(0),
            export_attempts: AtomicU64::new(0),
            export_retries: AtomicU64::new(0),
            batches_lost_on_shutdown: AtomicU64::new(0),
            records_lost_on_shutdown: AtomicU64::new(0),
            latency: Mutex::new(ExportLatency::new()),
            start_time: Instant::now(),
        }
    }

    pub fn record_accepted(&self) {
        self.records_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.records_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_sealed(&self) {
        self.batches_sealed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_dropped_overload(&self, records: usize) {
        self.batches_dropped_overload.fetch_add(1, Ordering::Relaxed);
        self.records_dropped_overload
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn batch_delivered(&self, records: usize, latency: Duration) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.records_delivered
            .fetch_add(records as u64, Ordering::Relaxed);
        self.latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(latency);
    }

    pub fn batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_rejected(&self) {
        self.batches_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn export_attempt(&self) {
        self.export_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn export_retry(&self) {
        self.export_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lost_on_shutdown(&self, batches: u64, records: u64) {
        self.batches_lost_on_shutdown
            .fetch_add(batches, Ordering::Relaxed);
        self.records_lost_on_shutdown
            .fetch_add(records, Ordering::Relaxed);
    }

    pub fn latency(&self) -> ExportLatency {
        self.latency
            .lock()
            .map(|l| l.clone())
            .unwrap_or_else(|_| ExportLatency::new())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            batches_sealed: self.batches_sealed.load(Ordering::Relaxed),
            batches_dropped_overload: self.batches_dropped_overload.load(Ordering::Relaxed),
            records_dropped_overload: self.records_dropped_overload.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            batches_rejected: self.batches_rejected.load(Ordering::Relaxed),
            export_attempts: self.export_attempts.load(Ordering::Relaxed),
            export_retries: self.export_retries.load(Ordering::Relaxed),
            batches_lost_on_shutdown: self.batches_lost_on_shutdown.load(Ordering::Relaxed),
            records_lost_on_shutdown: self.records_lost_on_shutdown.load(Ordering::Relaxed),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}
