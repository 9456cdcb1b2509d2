//! HTTP access used by the probe and the range workers.
//!
//! [`HttpTransport`] is the seam between the engine and the network. Every
//! call must open a fresh connection and resolve the host again (no DNS
//! cache, no connection reuse) so that a retry sees the server's current
//! state rather than a cached address or a half-dead pooled socket.
//! [`CurlTransport`] is the libcurl implementation used in production.

mod curl_backend;
mod error;
mod parse;

pub use curl_backend::CurlTransport;
pub use error::TransportError;

use std::time::Duration;

/// Inclusive byte range `[start, end]` sent as `Range: bytes=start-end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// HTTP Range header value: `bytes=start-end`.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// Range spec without the unit, as libcurl expects it (`start-end`).
    pub fn curl_spec(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// What a HEAD request told us about the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadResponse {
    /// Final HTTP status (after redirects).
    pub status: u32,
    /// `Content-Length`, if present and numeric.
    pub content_length: Option<u64>,
    /// True if the server sent `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
}

impl HeadResponse {
    /// `206 Partial Content`.
    pub fn is_partial(&self) -> bool {
        self.status == 206
    }
}

/// Blocking HTTP client abstraction.
pub trait HttpTransport: Send + Sync {
    /// Issue a HEAD request, optionally range-qualified. Non-2xx statuses are errors.
    fn head(
        &self,
        url: &str,
        range: Option<ByteRange>,
        timeout: Duration,
    ) -> Result<HeadResponse, TransportError>;

    /// Issue a GET request and stream the body into `sink`.
    ///
    /// The sink receives the status of the response each chunk belongs to,
    /// so a `200` answer to a ranged request can be told apart from a `206`.
    /// It returns `false` to stop the transfer early; that is not an error.
    /// Returns the final HTTP status. Non-2xx statuses are errors and their
    /// bodies are never passed to the sink.
    fn get(
        &self,
        url: &str,
        range: Option<ByteRange>,
        timeout: Duration,
        sink: &mut dyn FnMut(u32, &[u8]) -> bool,
    ) -> Result<u32, TransportError>;

    /// Stop verifying TLS certificates for every later request made through
    /// this transport. There is no way back short of building a new transport.
    fn disable_tls_validation(&self) {}
}
