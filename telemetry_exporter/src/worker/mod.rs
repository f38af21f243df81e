mod lane;
mod runtime;
pub mod state;

pub use state::ExporterState;

use crate::batch::{BatchAccumulator, LostSummary};
use crate::error::{ExporterError, Result};
use crate::observability::{DiagnosticsSink, ExporterMetrics};
use crate::record::RecordKind;
use crate::transport::{DrainDeadline, Sender};
use lane::ExportLane;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::watch;

struct WorkerInner {
    state: ExporterState,
    runtime: Option<Runtime>,
    finished: Option<mpsc::Receiver<RecordKind>>,
    /// Result of the first completed shutdown.
    clean_shutdown: Option<bool>,
}

/// Background side of an exporter: owns the runtime and the export lanes
/// and drives the lifecycle state machine.
pub struct ExportWorker {
    inner: Mutex<WorkerInner>,
    accumulator: Arc<BatchAccumulator>,
    sender: Arc<Sender>,
    deadline_tx: watch::Sender<Option<Instant>>,
    diagnostics: DiagnosticsSink,
    metrics: Arc<ExporterMetrics>,
}

impl ExportWorker {
    pub fn new(
        accumulator: Arc<BatchAccumulator>,
        sender: Arc<Sender>,
        diagnostics: DiagnosticsSink,
        metrics: Arc<ExporterMetrics>,
    ) -> Self {
        let (deadline_tx, _) = watch::channel(None);
        Self {
            inner: Mutex::new(WorkerInner {
                state: ExporterState::Created,
                runtime: None,
                finished: None,
                clean_shutdown: None,
            }),
            accumulator,
            sender,
            deadline_tx,
            diagnostics,
            metrics,
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, WorkerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ExporterState {
        self.lock_inner().state
    }

    /// Starts one export lane per record kind on a dedicated runtime.
    ///
    /// # Errors
    /// [`ExporterError::InvalidState`] unless the worker is `Created`;
    /// [`ExporterError::Runtime`] if the runtime cannot be built.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.lock_inner();
        if !inner.state.can_transition_to(ExporterState::Running) {
            return Err(ExporterError::InvalidState {
                state: inner.state,
                action: "start",
            });
        }

        let runtime = runtime::build_runtime()?;
        let (done_tx, done_rx) = mpsc::channel();
        for kind in RecordKind::ALL {
            let lane = ExportLane::new(
                kind,
                Arc::clone(&self.accumulator),
                Arc::clone(&self.sender),
                DrainDeadline::new(self.deadline_tx.subscribe()),
                self.diagnostics.clone(),
            );
            runtime.spawn(lane.run(done_tx.clone()));
        }

        inner.runtime = Some(runtime);
        inner.finished = Some(done_rx);
        inner.state = ExporterState::Running;
        drop(inner);

        self.diagnostics.info(&format!(
            "Export worker started ({} lanes, transport {}, batch size {}, flush interval {} ms)",
            RecordKind::ALL.len(),
            self.sender.transport_name(),
            self.accumulator.max_batch_size(),
            self.accumulator.flush_interval().as_millis()
        ));
        Ok(())
    }

    /// Stops accepting records, flushes partial batches and waits up to
    /// `timeout` for in-flight exports.
    ///
    /// Returns true only if every lane finished before the deadline and
    /// nothing was lost. Batches still queued or in flight at the deadline
    /// are abandoned and reported once, in aggregate. Repeating the call
    /// after completion returns the first result; a concurrent call made
    /// while draining returns false immediately.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let previous = {
            let mut inner = self.lock_inner();
            let current = inner.state;
            match current {
                ExporterState::Created | ExporterState::Running => {
                    inner.state = ExporterState::Draining;
                    current
                }
                ExporterState::Draining => {
                    drop(inner);
                    self.diagnostics
                        .debug("Shutdown already in progress; not waiting again");
                    return false;
                }
                ExporterState::Stopped => return inner.clean_shutdown.unwrap_or(false),
            }
        };

        let started = Instant::now();
        let deadline = started + timeout;
        let (lanes_finished, lost) = if previous == ExporterState::Created {
            (true, self.discard_unstarted())
        } else {
            self.drain_running(deadline)
        };

        if !lost.is_empty() {
            self.metrics.lost_on_shutdown(lost.batches, lost.records);
            self.diagnostics.error(&format!(
                "{} batches ({} records) lost on shutdown: not delivered within the {} ms drain timeout",
                lost.batches,
                lost.records,
                timeout.as_millis()
            ));
        }

        let clean = lanes_finished && lost.is_empty();
        {
            let mut inner = self.lock_inner();
            inner.state = ExporterState::Stopped;
            inner.clean_shutdown = Some(clean);
        }

        self.diagnostics.info(&format!(
            "Export worker stopped in {} ms (clean: {})",
            started.elapsed().as_millis(),
            clean
        ));
        clean
    }

    /// Never started: no lane can deliver, so everything outstanding is lost.
    fn discard_unstarted(&self) -> LostSummary {
        let mut lost = LostSummary::default();
        for batch in self.accumulator.drain() {
            lost.batches += 1;
            lost.records += batch.len() as u64;
        }
        lost += self.accumulator.abandon_all();
        lost
    }

    fn drain_running(&self, deadline: Instant) -> (bool, LostSummary) {
        self.accumulator.close();
        self.deadline_tx.send_replace(Some(deadline));

        let finished = self.lock_inner().finished.take();
        let lanes_finished = match finished {
            Some(rx) => wait_for_lanes(&rx, deadline),
            None => true,
        };

        let lost = self.accumulator.abandon_all();
        if let Some(runtime) = self.lock_inner().runtime.take() {
            // lanes still blocked on the network are not awaited
            runtime.shutdown_background();
        }
        (lanes_finished, lost)
    }
}

fn wait_for_lanes(rx: &mpsc::Receiver<RecordKind>, deadline: Instant) -> bool {
    let mut remaining = RecordKind::ALL.len();
    while remaining > 0 {
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        match rx.recv_timeout(deadline - now) {
            Ok(_) => remaining -= 1,
            Err(RecvTimeoutError::Timeout) => return false,
            // every lane is gone; anything it left behind is counted by abandon
            Err(RecvTimeoutError::Disconnected) => return true,
        }
    }
    true
}

impl Drop for ExportWorker {
    fn drop(&mut self) {
        let runtime = self
            .inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .runtime
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}
