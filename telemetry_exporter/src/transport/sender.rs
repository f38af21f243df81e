use super::payload::{Compression, ExportPayload};
use super::retry::RetryPolicy;
use super::{AttemptOutcome, ExportAttempt, Transport, TransportResponse};
use crate::batch::SealedBatch;
use crate::config::ExporterConfig;
use crate::error::{ExporterError, Result};
use crate::observability::{DiagnosticsSink, ExporterMetrics};
use crate::record::RecordKind;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Shutdown deadline as seen by an export lane.
///
/// `None` until shutdown begins; afterwards the instant by which all
/// in-flight work must finish.
#[derive(Clone, Debug)]
pub struct DrainDeadline {
    rx: watch::Receiver<Option<Instant>>,
}

impl DrainDeadline {
    pub fn new(rx: watch::Receiver<Option<Instant>>) -> Self {
        Self { rx }
    }

    /// A deadline that is never set.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(None);
        Self { rx }
    }

    pub fn current(&self) -> Option<Instant> {
        *self.rx.borrow()
    }

    pub fn is_set(&self) -> bool {
        self.current().is_some()
    }

    /// Time left until the deadline; `None` when no deadline is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.current()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn has_passed(&self) -> bool {
        self.remaining().is_some_and(|r| r.is_zero())
    }

    /// `limit`, shortened to the time left before the deadline.
    pub fn clamp(&self, limit: Duration) -> Duration {
        match self.remaining() {
            Some(remaining) => remaining.min(limit),
            None => limit,
        }
    }

    /// Resolves once a deadline is set and has passed.
    pub async fn expired(&mut self) {
        loop {
            let current = *self.rx.borrow_and_update();
            match current {
                Some(deadline) => {
                    tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
                    return;
                }
                None => self.changed().await,
            }
        }
    }

    /// Resolves when the deadline value changes. Pends forever once the
    /// owning worker is gone.
    pub async fn changed(&mut self) {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Terminal result of exporting one sealed batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Delivered,
    /// Every allowed attempt failed transiently.
    RetriesExhausted { last_error: String },
    /// Refused without retry: a permanent status or an encoding failure.
    Rejected { status: Option<u16>, detail: String },
    /// Given up because the shutdown deadline passed or no retry could
    /// finish before it. Counted as lost on shutdown.
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub kind: RecordKind,
    pub sequence: u64,
    pub records: usize,
    pub description: String,
    pub outcome: ExportOutcome,
    pub attempts: Vec<ExportAttempt>,
    /// Time from sealing to the terminal outcome.
    pub elapsed: Duration,
}

impl ExportReport {
    fn new(batch: &SealedBatch) -> Self {
        Self {
            kind: batch.kind(),
            sequence: batch.sequence(),
            records: batch.len(),
            description: batch.describe(),
            outcome: ExportOutcome::Abandoned,
            attempts: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    pub fn retries(&self) -> usize {
        self.attempts.len().saturating_sub(1)
    }
}

/// Transmits sealed batches with retry and reports terminal outcomes.
pub struct Sender {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    service_name: String,
    compression: Compression,
    request_timeout: Duration,
    excerpt_bytes: usize,
    diagnostics: DiagnosticsSink,
    metrics: Arc<ExporterMetrics>,
}

impl Sender {
    pub fn new(
        config: &ExporterConfig,
        transport: Arc<dyn Transport>,
        diagnostics: DiagnosticsSink,
        metrics: Arc<ExporterMetrics>,
    ) -> Self {
        Self {
            transport,
            policy: RetryPolicy::from_config(config),
            service_name: config.service_name.clone(),
            compression: config.compression,
            request_timeout: config.request_timeout,
            excerpt_bytes: config.error_body_excerpt_bytes,
            diagnostics,
            metrics,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Exports one batch until it reaches a terminal outcome.
    ///
    /// Each attempt's timeout is the configured request timeout shortened to
    /// whatever remains before `deadline`. Once the deadline passes, the
    /// pending attempt or backoff is dropped and the batch is `Abandoned`.
    pub async fn send(&self, batch: &SealedBatch, deadline: &mut DrainDeadline) -> ExportReport {
        let mut report = ExportReport::new(batch);
        report.outcome = self.run_attempts(batch, deadline, &mut report.attempts).await;
        report.elapsed = batch.sealed_at().elapsed();
        report
    }

    async fn run_attempts(
        &self,
        batch: &SealedBatch,
        deadline: &mut DrainDeadline,
        attempts: &mut Vec<ExportAttempt>,
    ) -> ExportOutcome {
        let payload = match ExportPayload::encode(batch, &self.service_name, self.compression) {
            Ok(payload) => Arc::new(payload),
            Err(e) => {
                return ExportOutcome::Rejected {
                    status: None,
                    detail: e.to_string(),
                }
            }
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let timeout = deadline.clamp(self.request_timeout);
            if timeout.is_zero() {
                return ExportOutcome::Abandoned;
            }

            self.metrics.export_attempt();
            let result = tokio::select! {
                result = self.transmit(Arc::clone(&payload), timeout) => result,
                _ = deadline.expired() => return ExportOutcome::Abandoned,
            };

            let mut record = ExportAttempt::from_result(attempt, &result, self.excerpt_bytes);
            match record.outcome {
                AttemptOutcome::Success => {
                    attempts.push(record);
                    return ExportOutcome::Delivered;
                }
                AttemptOutcome::PermanentFailure => {
                    let outcome = ExportOutcome::Rejected {
                        status: record.status,
                        detail: record.detail(),
                    };
                    attempts.push(record);
                    return outcome;
                }
                AttemptOutcome::TransientFailure => {
                    let retries_done = attempt - 1;
                    if !self.policy.can_retry(retries_done) {
                        let last_error = record.detail();
                        attempts.push(record);
                        return ExportOutcome::RetriesExhausted { last_error };
                    }

                    let delay = self.policy.next_delay(retries_done, record.retry_after);
                    record.backoff = Some(delay);
                    let detail = record.detail();
                    attempts.push(record);

                    if deadline.remaining().is_some_and(|remaining| delay >= remaining) {
                        return ExportOutcome::Abandoned;
                    }

                    self.diagnostics.debug(&format!(
                        "Export of {} failed on attempt {}/{} ({}); retrying in {} ms",
                        batch.describe(),
                        attempt,
                        self.policy.max_attempts(),
                        detail,
                        delay.as_millis()
                    ));
                    self.metrics.export_retry();

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = deadline.expired() => return ExportOutcome::Abandoned,
                    }
                }
            }
        }
    }

    async fn transmit(
        &self,
        payload: Arc<ExportPayload>,
        timeout: Duration,
    ) -> Result<TransportResponse> {
        let transport = Arc::clone(&self.transport);
        tokio::task::spawn_blocking(move || transport.send(&payload, timeout))
            .await
            .unwrap_or_else(|e| Err(ExporterError::TransportTask(e.to_string())))
    }

    /// Records a terminal outcome in diagnostics, then in metrics.
    ///
    /// Abandoned batches are only logged at debug level here; shutdown
    /// reports them in aggregate.
    pub fn report(&self, report: &ExportReport) {
        match &report.outcome {
            ExportOutcome::Delivered => {
                self.diagnostics.debug(&format!(
                    "Exported {} via {} in {} attempt(s)",
                    report.description,
                    self.transport.name(),
                    report.attempt_count()
                ));
                self.metrics.batch_delivered(report.records, report.elapsed);
            }
            ExportOutcome::RetriesExhausted { last_error } => {
                self.diagnostics.error(&format!(
                    "Failed to export {} after {} attempts: {}; batch dropped",
                    report.description,
                    report.attempt_count(),
                    last_error
                ));
                self.metrics.batch_failed();
            }
            ExportOutcome::Rejected { status, detail } => {
                let status = status
                    .map(|s| format!(" with status {}", s))
                    .unwrap_or_default();
                self.diagnostics.error(&format!(
                    "Export of {} rejected{}: {}; batch dropped without retry",
                    report.description, status, detail
                ));
                self.metrics.batch_rejected();
            }
            ExportOutcome::Abandoned => {
                self.diagnostics.debug(&format!(
                    "Gave up on {} at the shutdown deadline after {} attempt(s)",
                    report.description,
                    report.attempt_count()
                ));
            }
        }
    }
}
