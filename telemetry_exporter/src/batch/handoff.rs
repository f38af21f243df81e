use super::SealedBatch;
use crate::record::RecordKind;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Batches and records dropped because shutdown ran out of time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LostSummary {
    pub batches: u64,
    pub records: u64,
}

impl LostSummary {
    pub fn is_empty(&self) -> bool {
        self.batches == 0
    }

    fn add(&mut self, records: usize) {
        self.batches += 1;
        self.records += records as u64;
    }
}

impl std::ops::AddAssign for LostSummary {
    fn add_assign(&mut self, other: Self) {
        self.batches += other.batches;
        self.records += other.records;
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    sequence: u64,
    records: usize,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<SealedBatch>,
    in_flight: Option<InFlight>,
    abandoned: bool,
    lost: LostSummary,
}

/// Bounded queue of sealed batches between producers and one export lane.
///
/// Also tracks the batch currently being exported so that shutdown and the
/// lane agree on who reports it: whoever clears the in-flight slot first
/// owns the report.
pub struct HandoffQueue {
    kind: RecordKind,
    capacity: usize,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl HandoffQueue {
    pub fn new(kind: RecordKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity: capacity.max(1),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    pub fn has_in_flight(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// Enqueues a sealed batch and wakes the lane.
    ///
    /// When the queue is at capacity the oldest pending batch is evicted and
    /// returned so the caller can count and report it. After
    /// [`abandon`](Self::abandon) the batch is counted as lost instead.
    pub fn push(&self, batch: SealedBatch) -> Option<SealedBatch> {
        let evicted = {
            let mut state = self.lock();
            if state.abandoned {
                state.lost.add(batch.len());
                return None;
            }
            let evicted = if state.pending.len() >= self.capacity {
                state.pending.pop_front()
            } else {
                None
            };
            state.pending.push_back(batch);
            evicted
        };
        self.notify.notify_one();
        evicted
    }

    /// Takes the oldest pending batch and marks it in flight.
    pub fn begin_next(&self) -> Option<SealedBatch> {
        let mut state = self.lock();
        if state.abandoned || state.in_flight.is_some() {
            return None;
        }
        let batch = state.pending.pop_front()?;
        state.in_flight = Some(InFlight {
            sequence: batch.sequence(),
            records: batch.len(),
        });
        Some(batch)
    }

    /// Clears the in-flight slot for `sequence`. Returns false when shutdown
    /// already claimed it, in which case the caller must not report.
    pub fn complete(&self, sequence: u64) -> bool {
        let mut state = self.lock();
        match state.in_flight {
            Some(f) if f.sequence == sequence => {
                state.in_flight = None;
                true
            }
            _ => false,
        }
    }

    /// Like [`complete`](Self::complete), counting the batch as lost on
    /// shutdown.
    pub fn complete_lost(&self, sequence: u64) -> bool {
        let mut state = self.lock();
        match state.in_flight {
            Some(f) if f.sequence == sequence => {
                state.in_flight = None;
                state.lost.add(f.records);
                true
            }
            _ => false,
        }
    }

    /// Removes every pending batch, oldest first. The in-flight batch, if
    /// any, stays with its lane.
    pub fn take_pending(&self) -> Vec<SealedBatch> {
        self.lock().pending.drain(..).collect()
    }

    /// Stops the queue for good: pending and in-flight batches are counted
    /// as lost and later pushes are counted too. Returns everything lost on
    /// this queue during shutdown, including batches the lane gave up on.
    pub fn abandon(&self) -> LostSummary {
        let mut state = self.lock();
        state.abandoned = true;
        if let Some(f) = state.in_flight.take() {
            state.lost.add(f.records);
        }
        while let Some(batch) = state.pending.pop_front() {
            state.lost.add(batch.len());
        }
        let lost = state.lost;
        drop(state);
        self.notify.notify_one();
        lost
    }

    pub fn is_abandoned(&self) -> bool {
        self.lock().abandoned
    }

    /// Resolves once a batch was pushed since the last wake-up.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{RecordBatch, SealReason};
    use crate::record::{MetricRecord, TelemetryRecord};
    use chrono::Utc;

    fn sealed(sequence: u64, records: usize) -> SealedBatch {
        let mut batch = RecordBatch::new(RecordKind::Metric, records.max(1));
        for i in 0..records {
            let record: TelemetryRecord = MetricRecord::new("m", i as f64, Utc::now()).into();
            batch.try_push(record).unwrap();
        }
        batch.seal(sequence, SealReason::Size)
    }

    #[test]
    fn test_push_and_begin_in_order() {
        let queue = HandoffQueue::new(RecordKind::Metric, 4);
        assert!(queue.push(sealed(1, 1)).is_none());
        assert!(queue.push(sealed(2, 1)).is_none());
        assert_eq!(queue.len(), 2);

        let first = queue.begin_next().unwrap();
        assert_eq!(first.sequence(), 1);
        assert!(queue.has_in_flight());
        // one batch at a time per lane
        assert!(queue.begin_next().is_none());

        assert!(queue.complete(1));
        let second = queue.begin_next().unwrap();
        assert_eq!(second.sequence(), 2);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let queue = HandoffQueue::new(RecordKind::Metric, 2);
        queue.push(sealed(1, 1));
        queue.push(sealed(2, 1));
        let evicted = queue.push(sealed(3, 1)).unwrap();

        assert_eq!(evicted.sequence(), 1);
        let remaining: Vec<u64> = queue.take_pending().iter().map(|b| b.sequence()).collect();
        assert_eq!(remaining, vec![2, 3]);
    }

    #[test]
    fn test_complete_wrong_sequence() {
        let queue = HandoffQueue::new(RecordKind::Metric, 2);
        queue.push(sealed(1, 1));
        queue.begin_next().unwrap();
        assert!(!queue.complete(99));
        assert!(queue.complete(1));
        assert!(!queue.complete(1));
    }

    #[test]
    fn test_abandon_counts_pending_and_in_flight() {
        let queue = HandoffQueue::new(RecordKind::Metric, 4);
        queue.push(sealed(1, 3));
        queue.push(sealed(2, 2));
        queue.push(sealed(3, 1));
        let in_flight = queue.begin_next().unwrap();

        let lost = queue.abandon();
        assert_eq!(lost, LostSummary { batches: 3, records: 6 });
        assert!(queue.is_abandoned());

        // shutdown already claimed it
        assert!(!queue.complete(in_flight.sequence()));
        assert!(queue.begin_next().is_none());
    }

    #[test]
    fn test_complete_lost_is_included_in_abandon() {
        let queue = HandoffQueue::new(RecordKind::Metric, 4);
        queue.push(sealed(1, 5));
        let batch = queue.begin_next().unwrap();
        assert!(queue.complete_lost(batch.sequence()));

        let lost = queue.abandon();
        assert_eq!(lost, LostSummary { batches: 1, records: 5 });
    }

    #[test]
    fn test_push_after_abandon_is_lost() {
        let queue = HandoffQueue::new(RecordKind::Metric, 4);
        queue.abandon();
        assert!(queue.push(sealed(1, 2)).is_none());
        assert!(queue.is_empty());
        assert_eq!(queue.abandon(), LostSummary { batches: 1, records: 2 });
    }

    #[tokio::test]
    async fn test_notified_after_push() {
        let queue = HandoffQueue::new(RecordKind::Metric, 4);
        queue.push(sealed(1, 1));
        // the stored permit resolves immediately
        queue.notified().await;
    }
}
