// Telemetry records handed to the export pipeline.

pub mod timestamp;

pub use timestamp::{now_epoch_millis, to_epoch_millis};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of telemetry a record or batch carries. Each kind has its own open
/// batch, hand-off queue and export lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Span,
    Metric,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Span, RecordKind::Metric];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Span => "span",
            RecordKind::Metric => "metric",
        }
    }

    /// Top-level key of the wire document holding records of this kind.
    pub fn payload_key(&self) -> &'static str {
        match self {
            RecordKind::Span => "spans",
            RecordKind::Metric => "metrics",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            RecordKind::Span => 0,
            RecordKind::Metric => 1,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error {
        message: String,
    },
}

/// One completed unit of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanRecord {
    /// Normalized start time, epoch milliseconds.
    pub timestamp: i64,
    pub trace_id: String,
    pub span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub name: String,
    pub start_time: i64,
    pub end_time: i64,
    pub duration_ms: i64,
    pub status: SpanStatus,
    pub attributes: Attributes,
}

impl SpanRecord {
    pub fn new<S, E>(
        trace_id: impl Into<String>,
        span_id: impl Into<String>,
        name: impl Into<String>,
        start: S,
        end: E,
    ) -> Self
    where
        S: Into<DateTime<Utc>>,
        E: Into<DateTime<Utc>>,
    {
        let start_time = to_epoch_millis(start);
        let end_time = to_epoch_millis(end);
        Self {
            timestamp: start_time,
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            parent_span_id: None,
            name: name.into(),
            start_time,
            end_time,
            duration_ms: end_time.saturating_sub(start_time).max(0),
            status: SpanStatus::Unset,
            attributes: Attributes::new(),
        }
    }

    pub fn with_parent(mut self, parent_span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }

    pub fn with_status(mut self, status: SpanStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// One metric data point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub timestamp: i64,
    pub name: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub attributes: Attributes,
}

impl MetricRecord {
    pub fn new<T>(name: impl Into<String>, value: f64, at: T) -> Self
    where
        T: Into<DateTime<Utc>>,
    {
        Self {
            timestamp: to_epoch_millis(at),
            name: name.into(),
            value,
            unit: None,
            attributes: Attributes::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Immutable telemetry value handed from the instrumentation layer to the
/// exporter. Serialized as an object tagged with `"kind"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryRecord {
    Span(SpanRecord),
    Metric(MetricRecord),
}

impl TelemetryRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            TelemetryRecord::Span(_) => RecordKind::Span,
            TelemetryRecord::Metric(_) => RecordKind::Metric,
        }
    }

    pub fn timestamp_millis(&self) -> i64 {
        match self {
            TelemetryRecord::Span(s) => s.timestamp,
            TelemetryRecord::Metric(m) => m.timestamp,
        }
    }
}

impl From<SpanRecord> for TelemetryRecord {
    fn from(span: SpanRecord) -> Self {
        TelemetryRecord::Span(span)
    }
}

impl From<MetricRecord> for TelemetryRecord {
    fn from(metric: MetricRecord) -> Self {
        TelemetryRecord::Metric(metric)
    }
}
