//! Capability probing: does the resource exist, how long is it, and will the
//! server honor byte ranges.
//!
//! Two HEAD requests are needed because some servers answer a plain HEAD but
//! ignore `Range`, and others do the reverse. Each request goes through the
//! transport's fresh-connection contract so a retry sees current DNS and
//! server state.

use serde::Serialize;

use crate::config::EngineSettings;
use crate::control::CancelToken;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::transport::{ByteRange, HttpTransport, TransportError};

/// What the probe learned about a URL. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceInfo {
    pub url: String,
    pub exists: bool,
    /// Total size in bytes. Meaningless when `exists` is false.
    pub length: u64,
    pub supports_head: bool,
    pub supports_range: bool,
}

impl ResourceInfo {
    fn unknown(url: &str) -> Self {
        Self {
            url: url.to_string(),
            exists: false,
            length: 0,
            supports_head: false,
            supports_range: false,
        }
    }
}

/// Probe `url`. Never fails: transport errors are retried per `settings` and
/// an unreachable resource is reported as `exists = false`.
pub fn probe(
    transport: &dyn HttpTransport,
    url: &str,
    settings: &EngineSettings,
    cancel: &CancelToken,
) -> ResourceInfo {
    let mut info = ResourceInfo::unknown(url);
    let policy = RetryPolicy::from(settings);

    let head = run_with_retry(&policy, cancel, "HEAD", |_| {
        let response = transport.head(url, None, settings.timeout)?;
        response
            .content_length
            .ok_or_else(|| TransportError::Protocol("missing Content-Length".to_string()))
    });
    match head {
        Ok(length) => {
            info.length = length;
            info.exists = true;
            info.supports_head = true;
        }
        Err(e) if e.is_absent() => {
            tracing::info!(url, "resource not available: {}", e);
            return info;
        }
        Err(e) => {
            tracing::warn!(url, "HEAD probe gave up: {}", e);
            return info;
        }
    }

    if info.length == 0 {
        return info;
    }

    let range = ByteRange::new(0, info.length - 1);
    let ranged = run_with_retry(&policy, cancel, "ranged HEAD", |_| {
        let response = transport.head(url, Some(range), settings.timeout)?;
        Ok(response.is_partial() || response.accept_ranges)
    });
    match ranged {
        Ok(supported) => info.supports_range = supported,
        Err(e) if e.is_absent() => {
            tracing::info!(url, "resource disappeared during range probe: {}", e);
            info.exists = false;
        }
        Err(e) => {
            tracing::warn!(url, "range probe gave up, assuming no range support: {}", e);
        }
    }

    info
}
