use crate::error::{ExporterError, Result};
use tokio::runtime::{Builder, Runtime};

const WORKER_THREADS: usize = 2;
const THREAD_NAME: &str = "telemetry-export";

/// Runtime owned by one exporter. Export lanes run on its worker threads
/// and blocking transport calls on its blocking pool.
pub(crate) fn build_runtime() -> Result<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(WORKER_THREADS)
        .thread_name(THREAD_NAME)
        .enable_time()
        .build()
        .map_err(|e| ExporterError::Runtime(format!("Failed to create tokio runtime: {}", e)))
}
