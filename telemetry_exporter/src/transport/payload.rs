use crate::batch::SealedBatch;
use crate::error::{ExporterError, Result};
use crate::record::{RecordKind, TelemetryRecord};
use serde::Serialize;
use std::str::FromStr;

const DEFAULT_ZSTD_LEVEL: i32 = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    None,
    Zstd(i32),
}

impl Compression {
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Zstd(_) => Some("zstd"),
        }
    }

    pub fn compress(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data),
            Self::Zstd(level) => zstd::encode_all(data.as_slice(), *level)
                .map_err(|e| ExporterError::Compression(format!("Zstd compression failed: {}", e))),
        }
    }
}

impl FromStr for Compression {
    type Err = ExporterError;

    /// `none`, `zstd` or `zstd:<level>`.
    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim().to_ascii_lowercase();
        match value.as_str() {
            "" | "none" => Ok(Self::None),
            "zstd" => Ok(Self::Zstd(DEFAULT_ZSTD_LEVEL)),
            other => match other.strip_prefix("zstd:") {
                Some(level) => level.parse::<i32>().map(Self::Zstd).map_err(|_| {
                    ExporterError::InvalidConfig(format!("invalid zstd level '{}'", level))
                }),
                None => Err(ExporterError::InvalidConfig(format!(
                    "unknown compression '{}', expected none, zstd or zstd:<level>",
                    s
                ))),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireDocument<'a> {
    service_name: &'a str,
    batch_sequence: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    spans: Option<&'a [TelemetryRecord]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<&'a [TelemetryRecord]>,
}

/// Encoded body of one sealed batch, ready for any transport.
#[derive(Debug, Clone)]
pub struct ExportPayload {
    pub kind: RecordKind,
    pub sequence: u64,
    pub record_count: usize,
    pub body: Vec<u8>,
    pub content_encoding: Option<&'static str>,
}

impl ExportPayload {
    /// Builds the wire document:
    ///
    /// ```json
    /// {
    ///   "serviceName": "checkout",
    ///   "batchSequence": 3,
    ///   "spans": [{"kind": "span", "timestamp": 1704067200000, ...}]
    /// }
    /// ```
    ///
    /// Metric batches carry a `"metrics"` array instead.
    pub fn encode(batch: &SealedBatch, service_name: &str, compression: Compression) -> Result<Self> {
        let records = Some(batch.records());
        let (spans, metrics) = match batch.kind() {
            RecordKind::Span => (records, None),
            RecordKind::Metric => (None, records),
        };
        let document = WireDocument {
            service_name,
            batch_sequence: batch.sequence(),
            spans,
            metrics,
        };

        let json = serde_json::to_vec(&document)?;
        let body = compression.compress(json)?;

        Ok(Self {
            kind: batch.kind(),
            sequence: batch.sequence(),
            record_count: batch.len(),
            body,
            content_encoding: compression.content_encoding(),
        })
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
