use log::Level;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

const LOG_TARGET: &str = "telemetry_exporter";
const DEFAULT_MEMORY_CAPACITY: usize = 256;

/// Destination for the exporter's own health events.
///
/// The pipeline reports overload drops, failed exports and shutdown losses
/// here. Implementations must not block for long; calls happen on producer
/// threads (overload warnings) and on the export runtime.
pub trait Diagnostics: Send + Sync {
    fn log(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

/// Forwards diagnostics to the `log` facade.
pub struct LogDiagnostics {
    enabled: bool,
}

impl LogDiagnostics {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Default for LogDiagnostics {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Diagnostics for LogDiagnostics {
    fn log(&self, level: Level, message: &str) {
        if !self.enabled {
            return;
        }

        log::log!(target: LOG_TARGET, level, "{}", message);
    }
}

/// Discards everything.
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
    fn log(&self, _level: Level, _message: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub level: Level,
    pub message: String,
}

/// Keeps the most recent events in memory, plus the last error seen.
///
/// Useful for hosts exposing exporter health on a status endpoint.
pub struct MemoryDiagnostics {
    events: Mutex<VecDeque<DiagnosticEvent>>,
    last_error: Mutex<Option<String>>,
    capacity: usize,
}

impl MemoryDiagnostics {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            last_error: Mutex::new(None),
            capacity: capacity.max(1),
        }
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn count(&self, level: Level) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.level == level)
            .count()
    }

    /// Events at `level` whose message contains `needle`.
    pub fn matching(&self, level: Level, needle: &str) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.level == level && e.message.contains(needle))
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Default for MemoryDiagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn log(&self, level: Level, message: &str) {
        if level == Level::Error {
            *self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(message.to_string());
        }

        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(DiagnosticEvent {
            level,
            message: message.to_string(),
        });
    }
}

/// Handle the pipeline components log through.
///
/// Calls are no-ops when no sink is attached, and a panicking sink is
/// contained here so it never unwinds into a producer or the export loop.
#[derive(Clone, Default)]
pub struct DiagnosticsSink {
    inner: Option<Arc<dyn Diagnostics>>,
}

impl DiagnosticsSink {
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            inner: Some(diagnostics),
        }
    }

    pub fn detached() -> Self {
        Self { inner: None }
    }

    pub fn is_attached(&self) -> bool {
        self.inner.is_some()
    }

    pub fn log(&self, level: Level, message: &str) {
        let Some(sink) = &self.inner else {
            return;
        };
        let _ = panic::catch_unwind(AssertUnwindSafe(|| sink.log(level, message)));
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

impl From<Option<Arc<dyn Diagnostics>>> for DiagnosticsSink {
    fn from(inner: Option<Arc<dyn Diagnostics>>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingDiagnostics;

    impl Diagnostics for PanickingDiagnostics {
        fn log(&self, _level: Level, _message: &str) {
            panic!("sink exploded");
        }
    }

    #[test]
    fn test_log_diagnostics_enabled() {
        let diagnostics = LogDiagnostics::new(true);
        diagnostics.debug("debug");
        diagnostics.info("info");
        diagnostics.warn("warn");
        diagnostics.error("error");
    }

    #[test]
    fn test_log_diagnostics_default() {
        let diagnostics = LogDiagnostics::default();
        assert!(diagnostics.enabled);
    }

    #[test]
    fn test_log_diagnostics_disabled() {
        let diagnostics = LogDiagnostics::new(false);
        diagnostics.error("ignored");
    }

    #[test]
    fn test_memory_diagnostics_records_levels() {
        let diagnostics = MemoryDiagnostics::default();
        diagnostics.warn("queue full");
        diagnostics.error("export failed");
        diagnostics.debug("retrying");

        assert_eq!(diagnostics.events().len(), 3);
        assert_eq!(diagnostics.count(Level::Warn), 1);
        assert_eq!(diagnostics.count(Level::Error), 1);
        assert_eq!(diagnostics.last_error().as_deref(), Some("export failed"));
        assert_eq!(diagnostics.matching(Level::Debug, "retry").len(), 1);
    }

    #[test]
    fn test_memory_diagnostics_capacity() {
        let diagnostics = MemoryDiagnostics::new(2);
        diagnostics.info("one");
        diagnostics.info("two");
        diagnostics.info("three");

        let events = diagnostics.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "two");
        assert_eq!(events[1].message, "three");
    }

    #[test]
    fn test_memory_diagnostics_clear() {
        let diagnostics = MemoryDiagnostics::default();
        diagnostics.error("bad");
        diagnostics.clear();
        assert!(diagnostics.events().is_empty());
        assert!(diagnostics.last_error().is_none());
    }

    #[test]
    fn test_detached_sink_is_noop() {
        let sink = DiagnosticsSink::detached();
        assert!(!sink.is_attached());
        sink.error("nobody listens");
    }

    #[test]
    fn test_sink_forwards_to_diagnostics() {
        let memory = Arc::new(MemoryDiagnostics::default());
        let sink = DiagnosticsSink::new(memory.clone());
        sink.warn("dropped batch");
        assert_eq!(memory.matching(Level::Warn, "dropped").len(), 1);
    }

    #[test]
    fn test_sink_from_option() {
        let sink = DiagnosticsSink::from(Some(Arc::new(NoopDiagnostics) as Arc<dyn Diagnostics>));
        assert!(sink.is_attached());
        sink.info("swallowed");

        assert!(!DiagnosticsSink::from(None).is_attached());
    }

    #[test]
    fn test_sink_contains_panics() {
        let sink = DiagnosticsSink::new(Arc::new(PanickingDiagnostics));
        sink.error("must not unwind");
        sink.debug("still alive");
    }
}
