pub mod batch;
pub mod config;
mod error;
pub mod exporter;
pub mod observability;
pub mod record;
pub mod security;
#[cfg(feature = "test-helpers")]
pub mod test_helpers;
pub mod transport;
pub mod worker;

pub use config::ExporterConfig;
pub use error::{ErrorCategory, ExporterError, Result};
pub use exporter::Exporter;
pub use observability::{
    Diagnostics, DiagnosticsSink, LogDiagnostics, MemoryDiagnostics, MetricsSnapshot,
    NoopDiagnostics,
};
pub use record::{
    AttributeValue, Attributes, MetricRecord, RecordKind, SpanRecord, SpanStatus, TelemetryRecord,
};
pub use security::ApiKey;
pub use transport::{
    Compression, ConsoleTransport, ExportPayload, Transport, TransportResponse,
};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use worker::ExporterState;
