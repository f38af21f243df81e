use crate::batch::BatchAccumulator;
use crate::config::ExporterConfig;
use crate::error::Result;
use crate::observability::{DiagnosticsSink, ExportLatency, ExporterMetrics, MetricsSnapshot};
use crate::record::TelemetryRecord;
use crate::transport::{Sender, Transport};
use crate::worker::{ExportWorker, ExporterState};
use std::sync::Arc;
use std::time::Duration;

/// Batching telemetry exporter.
///
/// Producers call [`record`](Self::record) from any thread; records are
/// grouped per kind into batches and exported in the background with retry.
/// [`shutdown`](Self::shutdown) flushes what is buffered within a bounded
/// time. Dropping an exporter that was not shut down runs
/// [`close`](Self::close).
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use telemetry_exporter::{
///     DiagnosticsSink, Exporter, ExporterConfig, LogDiagnostics, MetricRecord,
/// };
///
/// let config = ExporterConfig::new("https://ingest.example.com/v1/telemetry", "secret");
/// let diagnostics = DiagnosticsSink::new(Arc::new(LogDiagnostics::default()));
/// let exporter = Exporter::with_http(config, diagnostics)?;
/// exporter.start()?;
/// exporter.record(MetricRecord::new("requests", 1.0, chrono::Utc::now()))?;
/// let clean = exporter.shutdown(Duration::from_secs(5));
/// # let _ = clean;
/// # Ok::<(), telemetry_exporter::ExporterError>(())
/// ```
pub struct Exporter {
    config: ExporterConfig,
    accumulator: Arc<BatchAccumulator>,
    worker: ExportWorker,
    metrics: Arc<ExporterMetrics>,
}

impl Exporter {
    /// Builds an exporter in the `Created` state.
    ///
    /// # Errors
    /// Returns a configuration error when `config` does not validate. No
    /// thread is started and nothing is sent until [`start`](Self::start).
    pub fn new(
        config: ExporterConfig,
        transport: Arc<dyn Transport>,
        diagnostics: DiagnosticsSink,
    ) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(ExporterMetrics::new());
        let accumulator = Arc::new(BatchAccumulator::new(
            &config,
            diagnostics.clone(),
            Arc::clone(&metrics),
        ));
        let sender = Arc::new(Sender::new(
            &config,
            transport,
            diagnostics.clone(),
            Arc::clone(&metrics),
        ));
        let worker = ExportWorker::new(
            Arc::clone(&accumulator),
            sender,
            diagnostics,
            Arc::clone(&metrics),
        );

        Ok(Self {
            config,
            accumulator,
            worker,
            metrics,
        })
    }

    /// Exporter posting to `config.endpoint_url` over HTTP.
    #[cfg(feature = "http")]
    pub fn with_http(config: ExporterConfig, diagnostics: DiagnosticsSink) -> Result<Self> {
        let transport = crate::transport::HttpTransport::new(&config)?;
        Self::new(config, Arc::new(transport), diagnostics)
    }

    /// Hands a record to the pipeline. Never blocks on the network.
    ///
    /// # Errors
    /// [`crate::ExporterError::ShuttingDown`] once shutdown has begun.
    pub fn record(&self, record: impl Into<TelemetryRecord>) -> Result<()> {
        self.accumulator.record(record.into())
    }

    pub fn start(&self) -> Result<()> {
        self.worker.start()
    }

    /// See [`ExportWorker::shutdown`].
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.worker.shutdown(timeout)
    }

    /// Shutdown with the configured drain timeout.
    pub fn close(&self) -> bool {
        self.shutdown(self.config.shutdown_drain_timeout)
    }

    pub fn state(&self) -> ExporterState {
        self.worker.state()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn export_latency(&self) -> ExportLatency {
        self.metrics.latency()
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }
}

impl Drop for Exporter {
    fn drop(&mut self) {
        if self.worker.state() != ExporterState::Stopped {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExporterError;
    use crate::observability::MemoryDiagnostics;
    use crate::record::{MetricRecord, SpanRecord};
    use crate::transport::ConsoleTransport;
    use chrono::Utc;
    use log::Level;

    fn config() -> ExporterConfig {
        let mut config = ExporterConfig::new("http://127.0.0.1:9/ingest", "key");
        config.shutdown_drain_timeout = Duration::from_secs(2);
        config
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ExporterConfig::new("http://127.0.0.1:9/ingest", "");
        let result = Exporter::new(config, Arc::new(ConsoleTransport), DiagnosticsSink::detached());
        assert!(matches!(result, Err(ExporterError::MissingConfig("api_key"))));
    }

    #[test]
    fn test_new_exporter_is_created() {
        let exporter =
            Exporter::new(config(), Arc::new(ConsoleTransport), DiagnosticsSink::detached()).unwrap();
        assert_eq!(exporter.state(), ExporterState::Created);
        assert_eq!(exporter.metrics(), MetricsSnapshot::default());
    }

    #[test]
    fn test_record_after_shutdown_fails_fast() {
        let exporter =
            Exporter::new(config(), Arc::new(ConsoleTransport), DiagnosticsSink::detached()).unwrap();
        exporter.start().unwrap();
        assert!(exporter.close());

        let now = Utc::now();
        let err = exporter
            .record(SpanRecord::new("t", "s", "late", now, now))
            .unwrap_err();
        assert!(matches!(err, ExporterError::ShuttingDown));
        assert_eq!(exporter.metrics().records_rejected, 1);
    }

    #[test]
    fn test_drop_runs_shutdown() {
        let memory = Arc::new(MemoryDiagnostics::default());
        {
            let exporter = Exporter::new(
                config(),
                Arc::new(ConsoleTransport),
                DiagnosticsSink::new(memory.clone()),
            )
            .unwrap();
            exporter.start().unwrap();
            exporter
                .record(MetricRecord::new("m", 1.0, Utc::now()))
                .unwrap();
        }
        assert_eq!(memory.matching(Level::Info, "Export worker stopped").len(), 1);
        assert_eq!(memory.count(Level::Error), 0);
    }
}
