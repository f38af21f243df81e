// Console transport - prints export documents to stdout
//
// Useful during development to see what would be sent to the endpoint.

use super::{ExportPayload, Transport, TransportResponse};
use crate::error::Result;
use std::time::Duration;

/// Writes each uncompressed document as one line on stdout and reports 200.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleTransport;

impl Transport for ConsoleTransport {
    fn name(&self) -> &'static str {
        "ConsoleTransport"
    }

    fn send(&self, payload: &ExportPayload, _timeout: Duration) -> Result<TransportResponse> {
        match payload.content_encoding {
            None => println!("{}", String::from_utf8_lossy(&payload.body)),
            Some(encoding) => println!(
                "[{} batch #{}: {} records, {} bytes {}]",
                payload.kind,
                payload.sequence,
                payload.record_count,
                payload.len(),
                encoding
            ),
        }
        Ok(TransportResponse::with_status(200))
    }
}
