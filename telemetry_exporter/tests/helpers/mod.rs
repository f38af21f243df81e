pub mod env;
pub mod server;
pub mod transports;

use std::time::{Duration, Instant};
use telemetry_exporter::ExporterConfig;

/// Routes `log` output through the test harness; safe to call repeatedly.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config pointing at an unused local port with fast timings.
#[allow(dead_code)]
pub fn test_config() -> ExporterConfig {
    let mut config = ExporterConfig::new("http://127.0.0.1:9/v1/ingest", "test-key");
    config.service_name = "integration-test".to_string();
    config.flush_interval = Duration::from_millis(100);
    config.backoff_base = Duration::from_millis(10);
    config.max_backoff = Duration::from_millis(500);
    config.shutdown_drain_timeout = Duration::from_secs(5);
    config
}

/// Polls `condition` until it holds or `timeout` passes.
#[allow(dead_code)]
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
