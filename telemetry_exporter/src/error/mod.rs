use crate::worker::ExporterState;
use thiserror::Error;

/// Error category for decision-making (retry, drop, surface to caller)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient error - retry may resolve
    Transient,
    /// Permanent error - retrying cannot fix the payload or credential
    Permanent,
    /// Configuration error - surfaced synchronously at construction
    Configuration,
    /// Lifecycle error - operation not valid in the current exporter state
    Lifecycle,
}

#[derive(Error, Debug, Clone)]
pub enum ExporterError {
    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Exporter is shutting down")]
    ShuttingDown,

    #[error("Cannot {action} while exporter is {state}")]
    InvalidState {
        state: ExporterState,
        action: &'static str,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Transport task failed: {0}")]
    TransportTask(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<serde_json::Error> for ExporterError {
    fn from(err: serde_json::Error) -> Self {
        ExporterError::Serialization(err.to_string())
    }
}

impl ExporterError {
    /// Returns true if the error is transient and the export may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            // a transport call that panicked or was cancelled by the runtime
            ExporterError::Network(_) | ExporterError::TransportTask(_) => true,
            _ => false,
        }
    }

    /// Returns true if this is a configuration error
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ExporterError::MissingConfig(_) | ExporterError::InvalidConfig(_)
        )
    }

    /// Returns the error category for decision-making
    pub fn error_category(&self) -> ErrorCategory {
        if self.is_configuration_error() {
            return ErrorCategory::Configuration;
        }
        if matches!(
            self,
            ExporterError::ShuttingDown | ExporterError::InvalidState { .. }
        ) {
            return ErrorCategory::Lifecycle;
        }
        if self.is_retryable() {
            return ErrorCategory::Transient;
        }
        ErrorCategory::Permanent
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_error_variants() {
        let err1 = ExporterError::MissingConfig("api_key");
        assert_eq!(err1.to_string(), "Missing required configuration: api_key");

        let err2 = ExporterError::ShuttingDown;
        assert_eq!(err2.to_string(), "Exporter is shutting down");

        let err3 = ExporterError::InvalidConfig("max_batch_size must be > 0".to_string());
        assert!(err3.to_string().contains("max_batch_size"));

        let err4 = ExporterError::Network("connection refused".to_string());
        assert!(err4.to_string().contains("connection refused"));

        let err5 = ExporterError::InvalidState {
            state: ExporterState::Stopped,
            action: "start",
        };
        assert_eq!(err5.to_string(), "Cannot start while exporter is stopped");
    }

    #[test]
    fn test_network_error_is_transient() {
        let err = ExporterError::Network("timed out".to_string());
        assert!(err.is_retryable());
        assert_eq!(err.error_category(), ErrorCategory::Transient);
    }

    #[test]
    fn test_serialization_error_is_permanent() {
        let err = ExporterError::Serialization("bad float".to_string());
        assert!(!err.is_retryable());
        assert_eq!(err.error_category(), ErrorCategory::Permanent);
    }

    #[test]
    fn test_transport_task_error_is_transient() {
        let err = ExporterError::TransportTask("task 12 panicked".to_string());
        assert!(err.is_retryable());
        assert_eq!(err.error_category(), ErrorCategory::Transient);

        // retry does not depend on message wording
        let other = ExporterError::Runtime("transport task failed".to_string());
        assert!(!other.is_retryable());
        assert_eq!(other.error_category(), ErrorCategory::Permanent);
    }

    #[test]
    fn test_configuration_category() {
        assert_eq!(
            ExporterError::MissingConfig("endpoint_url").error_category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            ExporterError::InvalidConfig("x".to_string()).error_category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_lifecycle_category() {
        assert_eq!(
            ExporterError::ShuttingDown.error_category(),
            ErrorCategory::Lifecycle
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ExporterError = parse_err.into();
        assert!(matches!(err, ExporterError::Serialization(_)));
    }
}
