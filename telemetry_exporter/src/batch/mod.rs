pub mod accumulator;
pub mod handoff;

pub use accumulator::BatchAccumulator;
pub use handoff::{HandoffQueue, LostSummary};

use crate::record::{RecordKind, TelemetryRecord};
use std::time::Instant;

/// Why a batch was sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealReason {
    /// Reached `max_batch_size`.
    Size,
    /// Aged past the flush interval.
    Interval,
    /// Sealed by shutdown while partially filled.
    Drain,
}

/// Open, append-only batch of one record kind.
#[derive(Debug)]
pub struct RecordBatch {
    kind: RecordKind,
    records: Vec<TelemetryRecord>,
    max_size: usize,
    created_at: Option<Instant>,
}

impl RecordBatch {
    pub fn new(kind: RecordKind, max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            kind,
            records: Vec::with_capacity(max_size.min(1024)),
            max_size,
            created_at: None,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.max_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Time the first record was appended; `None` while empty.
    pub fn created_at(&self) -> Option<Instant> {
        self.created_at
    }

    /// Whether the batch holds records and is at least `min_age` old.
    pub fn is_due(&self, now: Instant, min_age: std::time::Duration) -> bool {
        self.created_at
            .is_some_and(|created| now.saturating_duration_since(created) >= min_age)
    }

    /// Appends a record. Hands it back if the batch is full or the record is
    /// of another kind.
    pub fn try_push(&mut self, record: TelemetryRecord) -> Result<(), TelemetryRecord> {
        if self.is_full() || record.kind() != self.kind {
            return Err(record);
        }
        if self.created_at.is_none() {
            self.created_at = Some(Instant::now());
        }
        self.records.push(record);
        Ok(())
    }

    /// Consumes the batch. From here on nobody can append to it.
    pub fn seal(self, sequence: u64, reason: SealReason) -> SealedBatch {
        SealedBatch {
            kind: self.kind,
            sequence,
            records: self.records,
            reason,
            created_at: self.created_at.unwrap_or_else(Instant::now),
            sealed_at: Instant::now(),
        }
    }
}

/// Immutable batch owned by whoever currently holds it: the hand-off queue,
/// then the export attempt processing it.
#[derive(Debug)]
pub struct SealedBatch {
    kind: RecordKind,
    sequence: u64,
    records: Vec<TelemetryRecord>,
    reason: SealReason,
    created_at: Instant,
    sealed_at: Instant,
}

impl SealedBatch {
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Per-kind seal order, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn reason(&self) -> SealReason {
        self.reason
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn sealed_at(&self) -> Instant {
        self.sealed_at
    }

    pub fn into_records(self) -> Vec<TelemetryRecord> {
        self.records
    }

    /// Short label used in diagnostics, e.g. `span batch #4 (12 records)`.
    pub fn describe(&self) -> String {
        format!(
            "{} batch #{} ({} records)",
            self.kind,
            self.sequence,
            self.records.len()
        )
    }
}
