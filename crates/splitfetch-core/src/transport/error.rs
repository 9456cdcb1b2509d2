//! Per-request transport error.

use std::fmt;

/// Error returned by a single HEAD or GET (curl failure, HTTP error, short body).
/// Kept separate from `anyhow` so the retry loops can classify it.
#[derive(Debug)]
pub enum TransportError {
    /// Curl reported an error (timeout, connection, TLS, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Body ended before the expected number of bytes arrived.
    PartialTransfer { expected: u64, received: u64 },
    /// The server response could not be used (e.g. missing `Content-Length`).
    Protocol(String),
    /// The downloader was shut down while the request was in flight.
    Cancelled,
}

impl TransportError {
    /// Server says the resource is not there for us (403 / 404). Never retried.
    pub fn is_absent(&self) -> bool {
        matches!(self, TransportError::Http(403) | TransportError::Http(404))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Curl(e) => write!(f, "{}", e),
            TransportError::Http(code) => write!(f, "HTTP {}", code),
            TransportError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            TransportError::Protocol(msg) => write!(f, "protocol: {}", msg),
            TransportError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Curl(e) => Some(e),
            _ => None,
        }
    }
}

impl From<curl::Error> for TransportError {
    fn from(e: curl::Error) -> Self {
        TransportError::Curl(e)
    }
}
