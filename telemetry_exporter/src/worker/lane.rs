use crate::batch::BatchAccumulator;
use crate::observability::DiagnosticsSink;
use crate::record::RecordKind;
use crate::transport::{DrainDeadline, ExportOutcome, Sender};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::MissedTickBehavior;

/// Export loop for one record kind.
///
/// Batches of a kind are exported strictly one at a time, oldest first;
/// the lanes of different kinds run concurrently.
pub(crate) struct ExportLane {
    kind: RecordKind,
    accumulator: Arc<BatchAccumulator>,
    sender: Arc<Sender>,
    deadline: DrainDeadline,
    diagnostics: DiagnosticsSink,
}

impl ExportLane {
    pub(crate) fn new(
        kind: RecordKind,
        accumulator: Arc<BatchAccumulator>,
        sender: Arc<Sender>,
        deadline: DrainDeadline,
        diagnostics: DiagnosticsSink,
    ) -> Self {
        Self {
            kind,
            accumulator,
            sender,
            deadline,
            diagnostics,
        }
    }

    /// Runs until shutdown has drained the queue or abandoned it, then
    /// signals `done`.
    pub(crate) async fn run(mut self, done: mpsc::Sender<RecordKind>) {
        let kind = self.kind;
        let accumulator = Arc::clone(&self.accumulator);
        let queue = accumulator.queue(kind);

        let mut ticker = tokio::time::interval(accumulator.flush_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            // close() seals into the queue before the deadline is published,
            // so a pass that started with the deadline set sees every batch
            let draining = self.deadline.is_set();
            if !self.deliver_pending().await {
                break;
            }
            if draining {
                break;
            }

            tokio::select! {
                _ = queue.notified() => {}
                _ = ticker.tick() => {
                    accumulator.seal_due(kind, Instant::now());
                }
                _ = self.deadline.changed() => {}
            }
        }

        self.diagnostics
            .debug(&format!("Export lane for {} batches finished", kind));
        let _ = done.send(kind);
    }

    /// Exports queued batches in order until the queue is empty. Returns
    /// false when the lane must stop: the queue was abandoned or the
    /// deadline passed.
    async fn deliver_pending(&mut self) -> bool {
        let accumulator = Arc::clone(&self.accumulator);
        let queue = accumulator.queue(self.kind);

        while let Some(batch) = queue.begin_next() {
            let report = self.sender.send(&batch, &mut self.deadline).await;
            let sequence = batch.sequence();
            drop(batch);

            match report.outcome {
                ExportOutcome::Abandoned => {
                    if queue.complete_lost(sequence) {
                        self.sender.report(&report);
                    }
                    if self.deadline.has_passed() {
                        return false;
                    }
                }
                _ => {
                    if queue.complete(sequence) {
                        self.sender.report(&report);
                    }
                }
            }
        }

        !queue.is_abandoned()
    }
}
