use std::fmt;

/// Lifecycle of an exporter.
///
/// Transitions only move forward and each state is entered at most once:
/// `Created -> Running -> Draining -> Stopped`, or `Created -> Draining`
/// when shutdown happens without a start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExporterState {
    Created,
    Running,
    Draining,
    Stopped,
}

impl ExporterState {
    pub fn can_transition_to(self, next: ExporterState) -> bool {
        use ExporterState::*;
        matches!(
            (self, next),
            (Created, Running) | (Created, Draining) | (Running, Draining) | (Draining, Stopped)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExporterState::Created => "created",
            ExporterState::Running => "running",
            ExporterState::Draining => "draining",
            ExporterState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ExporterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
