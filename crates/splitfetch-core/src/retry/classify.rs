//! Map transport errors onto retry policy error kinds.

use crate::retry::policy::ErrorKind;
use crate::transport::TransportError;

/// Classify a transport error for retry decisions.
///
/// Everything other than 403/404 and cancellation is transient: timeouts,
/// resets, 5xx, unexpected 4xx and short bodies all get another attempt.
pub fn classify(e: &TransportError) -> ErrorKind {
    if e.is_absent() {
        return ErrorKind::Absent;
    }
    match e {
        TransportError::Cancelled => ErrorKind::Cancelled,
        _ => ErrorKind::Transient,
    }
}

/// Classification for range GETs once the probe has found the resource.
///
/// A 403/404 mid-transfer is treated like any other failure and retried;
/// only cancellation ends the loop early.
pub fn classify_transfer(e: &TransportError) -> ErrorKind {
    match e {
        TransportError::Cancelled => ErrorKind::Cancelled,
        _ => ErrorKind::Transient,
    }
}
