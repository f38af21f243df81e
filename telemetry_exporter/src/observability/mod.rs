pub mod diagnostics;
pub mod metrics;

pub use diagnostics::{
    DiagnosticEvent, Diagnostics, DiagnosticsSink, LogDiagnostics, MemoryDiagnostics,
    NoopDiagnostics,
};
pub use metrics::{ExportLatency, ExporterMetrics, MetricsSnapshot};
