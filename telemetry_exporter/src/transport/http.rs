// HTTP transport - posts export documents to the ingestion endpoint
//
// One POST per batch with the API key in a configurable header.

use super::retry::parse_retry_after;
use super::{ExportPayload, Transport, TransportResponse};
use crate::config::ExporterConfig;
use crate::error::{ExporterError, Result};
use crate::security::ApiKey;
use chrono::Utc;
use std::io::Read;
use std::time::Duration;
use ureq::{Agent, AgentBuilder};

pub struct HttpTransport {
    agent: Agent,
    endpoint: String,
    api_key: ApiKey,
    api_key_header: String,
    excerpt_bytes: usize,
}

impl HttpTransport {
    const DEFAULT_USER_AGENT: &'static str =
        concat!("telemetry_exporter/", env!("CARGO_PKG_VERSION"));

    /// Creates a transport for the configured endpoint.
    ///
    /// # Errors
    /// Returns a configuration error when `config` does not validate.
    pub fn new(config: &ExporterConfig) -> Result<Self> {
        config.validate()?;

        let agent = AgentBuilder::new()
            .timeout(config.request_timeout)
            .user_agent(Self::DEFAULT_USER_AGENT)
            .build();

        Ok(Self {
            agent,
            endpoint: config.endpoint_url.clone(),
            api_key: config.api_key.clone(),
            api_key_header: config.api_key_header.clone(),
            excerpt_bytes: config.error_body_excerpt_bytes,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn read_response(&self, response: ureq::Response) -> TransportResponse {
        let status = response.status();
        let retry_after = response
            .header("retry-after")
            .and_then(|value| parse_retry_after(value, Utc::now()));

        let mut body = Vec::new();
        if status >= 300 {
            if let Err(e) = response
                .into_reader()
                .take(self.excerpt_bytes as u64)
                .read_to_end(&mut body)
            {
                log::debug!("Failed to read response body from {}: {}", self.endpoint, e);
            }
        }

        TransportResponse {
            status,
            retry_after,
            body_excerpt: String::from_utf8_lossy(&body).into_owned(),
        }
    }
}

impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "HttpTransport"
    }

    fn send(&self, payload: &ExportPayload, timeout: Duration) -> Result<TransportResponse> {
        let mut request = self
            .agent
            .post(&self.endpoint)
            .timeout(timeout)
            .set("Content-Type", "application/json")
            .set(&self.api_key_header, self.api_key.expose());
        if let Some(encoding) = payload.content_encoding {
            request = request.set("Content-Encoding", encoding);
        }

        match request.send_bytes(&payload.body) {
            Ok(response) => Ok(self.read_response(response)),
            Err(ureq::Error::Status(_, response)) => Ok(self.read_response(response)),
            Err(ureq::Error::Transport(e)) => Err(ExporterError::Network(format!(
                "POST {} failed: {}",
                self.endpoint, e
            ))),
        }
    }
}
