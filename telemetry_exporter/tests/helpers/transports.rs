//! Stub transports for driving the pipeline without a network.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use telemetry_exporter::{
    ExportPayload, ExporterError, RecordKind, Result, Transport, TransportResponse,
};

/// One batch as the endpoint would have received it.
#[derive(Debug, Clone)]
pub struct CapturedBatch {
    pub kind: RecordKind,
    pub sequence: u64,
    pub document: serde_json::Value,
}

impl CapturedBatch {
    fn from_payload(payload: &ExportPayload) -> Self {
        let document = serde_json::from_slice(&payload.body).expect("payload should be JSON");
        Self {
            kind: payload.kind,
            sequence: payload.sequence,
            document,
        }
    }

    pub fn records(&self) -> Vec<serde_json::Value> {
        self.document[self.kind.payload_key()]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    /// `name` of every record, in document order.
    pub fn names(&self) -> Vec<String> {
        self.records()
            .iter()
            .map(|r| r["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

/// Accepts every batch with 200 and keeps it.
#[derive(Default)]
pub struct CapturingTransport {
    batches: Mutex<Vec<CapturedBatch>>,
}

impl CapturingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn batches(&self) -> Vec<CapturedBatch> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batches_of(&self, kind: RecordKind) -> Vec<CapturedBatch> {
        self.batches()
            .into_iter()
            .filter(|b| b.kind == kind)
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.batches().iter().map(|b| b.records().len()).sum()
    }

    fn capture(&self, payload: &ExportPayload) {
        self.batches
            .lock()
            .unwrap()
            .push(CapturedBatch::from_payload(payload));
    }
}

impl Transport for CapturingTransport {
    fn name(&self) -> &'static str {
        "CapturingTransport"
    }

    fn send(&self, payload: &ExportPayload, _timeout: Duration) -> Result<TransportResponse> {
        self.capture(payload);
        Ok(TransportResponse::with_status(200))
    }
}

/// Replies from a script, repeating the last entry once it runs out, and
/// remembers when each call happened.
pub struct ScriptedTransport {
    script: Mutex<Vec<Result<TransportResponse>>>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<TransportResponse>>) -> Arc<Self> {
        assert!(!script.is_empty(), "script needs at least one entry");
        Arc::new(Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn always(status: u16) -> Arc<Self> {
        Self::new(vec![Ok(TransportResponse::with_status(status))])
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Time between consecutive calls.
    pub fn gaps(&self) -> Vec<Duration> {
        let calls = self.calls.lock().unwrap();
        calls.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, _payload: &ExportPayload, _timeout: Duration) -> Result<TransportResponse> {
        self.calls.lock().unwrap().push(Instant::now());
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.remove(0)
        } else {
            script[0].clone()
        }
    }
}

/// Never returns, like a connection that hangs without a timeout.
#[derive(Default)]
pub struct BlockingTransport {
    calls: AtomicUsize,
}

impl BlockingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for BlockingTransport {
    fn send(&self, _payload: &ExportPayload, _timeout: Duration) -> Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        loop {
            std::thread::park();
        }
    }
}

/// Holds every call until [`release`](Self::release), then captures.
pub struct GatedTransport {
    open: Mutex<bool>,
    gate: Condvar,
    entered: AtomicUsize,
    inner: Arc<CapturingTransport>,
}

impl GatedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            open: Mutex::new(false),
            gate: Condvar::new(),
            entered: AtomicUsize::new(0),
            inner: CapturingTransport::new(),
        })
    }

    pub fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.gate.notify_all();
    }

    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn captured(&self) -> Arc<CapturingTransport> {
        Arc::clone(&self.inner)
    }
}

impl Transport for GatedTransport {
    fn send(&self, payload: &ExportPayload, timeout: Duration) -> Result<TransportResponse> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.gate.wait(open).unwrap();
        }
        drop(open);
        self.inner.send(payload, timeout)
    }
}

/// Fails with a network error `failures` times, then accepts.
pub struct FlakyNetworkTransport {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyNetworkTransport {
    pub fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for FlakyNetworkTransport {
    fn send(&self, _payload: &ExportPayload, _timeout: Duration) -> Result<TransportResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(ExporterError::Network("connection reset by peer".to_string()))
        } else {
            Ok(TransportResponse::with_status(202))
        }
    }
}
