use super::{HandoffQueue, LostSummary, RecordBatch, SealReason, SealedBatch};
use crate::config::ExporterConfig;
use crate::error::{ExporterError, Result};
use crate::observability::{DiagnosticsSink, ExporterMetrics};
use crate::record::{RecordKind, TelemetryRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct OpenBatch {
    batch: RecordBatch,
    next_sequence: u64,
}

impl OpenBatch {
    fn seal(&mut self, reason: SealReason) -> SealedBatch {
        let fresh = RecordBatch::new(self.batch.kind(), self.batch.max_size());
        let full = std::mem::replace(&mut self.batch, fresh);
        self.next_sequence += 1;
        full.seal(self.next_sequence, reason)
    }
}

struct Lane {
    open: Mutex<OpenBatch>,
    queue: HandoffQueue,
}

impl Lane {
    fn lock_open(&self) -> MutexGuard<'_, OpenBatch> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Collects records into per-kind batches and hands sealed batches to the
/// export lanes.
///
/// `record` only takes the short per-kind lock; it never waits on the
/// network. A batch is sealed as soon as it reaches `max_batch_size`, by the
/// periodic tick once it is older than `flush_interval`, or by shutdown.
/// Sealing and enqueueing happen under the same lock so batches of a kind
/// reach their queue in sequence order.
pub struct BatchAccumulator {
    max_batch_size: usize,
    flush_interval: Duration,
    lanes: [Lane; 2],
    closed: AtomicBool,
    diagnostics: DiagnosticsSink,
    metrics: Arc<ExporterMetrics>,
}

impl BatchAccumulator {
    pub fn new(
        config: &ExporterConfig,
        diagnostics: DiagnosticsSink,
        metrics: Arc<ExporterMetrics>,
    ) -> Self {
        let lane = |kind: RecordKind| Lane {
            open: Mutex::new(OpenBatch {
                batch: RecordBatch::new(kind, config.max_batch_size),
                next_sequence: 0,
            }),
            queue: HandoffQueue::new(kind, config.max_pending_batches),
        };

        Self {
            max_batch_size: config.max_batch_size.max(1),
            flush_interval: config.flush_interval,
            lanes: [lane(RecordKind::Span), lane(RecordKind::Metric)],
            closed: AtomicBool::new(false),
            diagnostics,
            metrics,
        }
    }

    fn lane(&self, kind: RecordKind) -> &Lane {
        &self.lanes[kind.index()]
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    pub fn queue(&self, kind: RecordKind) -> &HandoffQueue {
        &self.lane(kind).queue
    }

    /// Records in the open (unsealed) batch of `kind`.
    pub fn open_len(&self, kind: RecordKind) -> usize {
        self.lane(kind).lock_open().batch.len()
    }

    pub fn pending_batches(&self, kind: RecordKind) -> usize {
        self.lane(kind).queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Appends a record to the open batch of its kind.
    ///
    /// Fails fast with [`ExporterError::ShuttingDown`] once the accumulator
    /// is closed. Overload never surfaces here: if the hand-off queue is
    /// full the oldest sealed batch is dropped and reported instead.
    pub fn record(&self, record: TelemetryRecord) -> Result<()> {
        let lane = self.lane(record.kind());

        let evicted = {
            let mut open = lane.lock_open();
            if self.is_closed() {
                self.metrics.record_rejected();
                return Err(ExporterError::ShuttingDown);
            }

            // full batches are sealed eagerly, so the open one always has room
            if let Err(record) = open.batch.try_push(record) {
                self.metrics.record_rejected();
                return Err(ExporterError::Runtime(format!(
                    "{} record routed to {} batch",
                    record.kind(),
                    open.batch.kind()
                )));
            }
            self.metrics.record_accepted();

            if open.batch.is_full() {
                let sealed = open.seal(SealReason::Size);
                self.hand_off(lane, sealed)
            } else {
                None
            }
        };

        if let Some(dropped) = evicted {
            self.report_overload(dropped);
        }
        Ok(())
    }

    /// Periodic tick: seals the open batch of `kind` if it holds records and
    /// is at least `flush_interval` old. Returns whether a batch was sealed.
    pub fn seal_due(&self, kind: RecordKind, now: Instant) -> bool {
        let lane = self.lane(kind);
        let evicted = {
            let mut open = lane.lock_open();
            if !open.batch.is_due(now, self.flush_interval) {
                return false;
            }
            let sealed = open.seal(SealReason::Interval);
            self.hand_off(lane, sealed)
        };

        if let Some(dropped) = evicted {
            self.report_overload(dropped);
        }
        true
    }

    /// Stops accepting records and seals every non-empty open batch into its
    /// hand-off queue, so running lanes deliver them.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);

        for lane in &self.lanes {
            let evicted = {
                let mut open = lane.lock_open();
                if open.batch.is_empty() {
                    continue;
                }
                let sealed = open.seal(SealReason::Drain);
                self.hand_off(lane, sealed)
            };
            if let Some(dropped) = evicted {
                self.report_overload(dropped);
            }
        }
    }

    /// Stops accepting records and returns every outstanding batch: queued
    /// ones first, then the partially filled open batches, per kind in seal
    /// order. Used when no lane is running to deliver them.
    pub fn drain(&self) -> Vec<SealedBatch> {
        self.closed.store(true, Ordering::SeqCst);

        let mut drained = Vec::new();
        for lane in &self.lanes {
            let mut open = lane.lock_open();
            drained.extend(lane.queue.take_pending());
            if !open.batch.is_empty() {
                let sealed = open.seal(SealReason::Drain);
                self.metrics.batch_sealed();
                drained.push(sealed);
            }
        }
        drained
    }

    /// Gives up on everything still queued or in flight on every lane.
    pub fn abandon_all(&self) -> LostSummary {
        let mut lost = LostSummary::default();
        for lane in &self.lanes {
            lost += lane.queue.abandon();
        }
        lost
    }

    fn hand_off(&self, lane: &Lane, sealed: SealedBatch) -> Option<SealedBatch> {
        self.metrics.batch_sealed();
        lane.queue.push(sealed)
    }

    fn report_overload(&self, dropped: SealedBatch) {
        self.metrics.batch_dropped_overload(dropped.len());
        self.diagnostics.warn(&format!(
            "Export queue full ({} pending {} batches): dropped oldest {}",
            self.lane(dropped.kind()).queue.capacity(),
            dropped.kind(),
            dropped.describe()
        ));
    }
}
