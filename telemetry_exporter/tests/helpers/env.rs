//! Helper functions for reading environment variables in tests

use telemetry_exporter::test_helpers::load_dotenv;

/// Endpoint and API key of a live ingestion service, from
/// `TELEMETRY_EXPORTER_TEST_ENDPOINT` and `TELEMETRY_EXPORTER_TEST_API_KEY`.
/// Returns None if either is unset (tests should be skipped in this case).
#[allow(dead_code)]
pub fn live_endpoint() -> Option<(String, String)> {
    load_dotenv();

    let endpoint = non_empty_var("TELEMETRY_EXPORTER_TEST_ENDPOINT")?;
    let api_key = non_empty_var("TELEMETRY_EXPORTER_TEST_API_KEY")?;
    Some((endpoint, api_key))
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}
