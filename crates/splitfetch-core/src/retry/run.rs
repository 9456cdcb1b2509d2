//! Retry loop: run a closure until success or policy says stop.

use super::classify;
use super::policy::{ErrorKind, RetryDecision, RetryPolicy};
use crate::control::CancelToken;
use crate::transport::TransportError;

/// Runs `f` until it succeeds or the retry policy says to stop, classifying
/// failures with [`classify::classify`] (403/404 are final).
///
/// `f` receives the 1-based attempt number. On a retryable failure the loop
/// waits the policy delay (cut short by cancellation) and tries again. The
/// last error is returned on exhaustion; `TransportError::Cancelled` is
/// returned as soon as `cancel` fires between attempts.
pub fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    what: &str,
    f: F,
) -> Result<T, TransportError>
where
    F: FnMut(u32) -> Result<T, TransportError>,
{
    run_with_retry_as(policy, cancel, what, classify::classify, f)
}

/// Same loop as [`run_with_retry`] with a caller-chosen classification.
pub fn run_with_retry_as<T, F>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    what: &str,
    classify: fn(&TransportError) -> ErrorKind,
    mut f: F,
) -> Result<T, TransportError>
where
    F: FnMut(u32) -> Result<T, TransportError>,
{
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let err = match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        let kind = classify(&err);
        match policy.decide(attempt, kind) {
            RetryDecision::NoRetry => {
                if kind == ErrorKind::Transient {
                    tracing::warn!(attempt, "{} failed, giving up: {}", what, err);
                }
                return Err(err);
            }
            RetryDecision::RetryAfter(d) => {
                tracing::warn!(
                    attempt,
                    max_tries = policy.max_tries,
                    "{} failed: {}; retrying in {:?}",
                    what,
                    err,
                    d
                );
                if !cancel.sleep(d) {
                    return Err(TransportError::Cancelled);
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast(max_tries: u32) -> RetryPolicy {
        RetryPolicy {
            max_tries,
            wait: Duration::from_millis(1),
        }
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let cancel = CancelToken::new();
        let mut calls = 0;
        let r = run_with_retry(&fast(5), &cancel, "test", |attempt| {
            calls += 1;
            if attempt < 3 {
                Err(TransportError::Http(503))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(r.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn stops_at_max_tries() {
        let cancel = CancelToken::new();
        let mut calls = 0;
        let r: Result<(), _> = run_with_retry(&fast(4), &cancel, "test", |_| {
            calls += 1;
            Err(TransportError::Http(500))
        });
        assert!(matches!(r, Err(TransportError::Http(500))));
        assert_eq!(calls, 4);
    }

    #[test]
    fn absent_is_not_retried() {
        let cancel = CancelToken::new();
        let mut calls = 0;
        let r: Result<(), _> = run_with_retry(&fast(100), &cancel, "test", |_| {
            calls += 1;
            Err(TransportError::Http(404))
        });
        assert!(matches!(r, Err(TransportError::Http(404))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn transfer_classification_retries_not_found() {
        let cancel = CancelToken::new();
        let mut calls = 0;
        let r = run_with_retry_as(&fast(5), &cancel, "test", classify::classify_transfer, |attempt| {
            calls += 1;
            if attempt == 1 {
                Err(TransportError::Http(404))
            } else {
                Ok(())
            }
        });
        assert!(r.is_ok());
        assert_eq!(calls, 2);
    }

    #[test]
    fn cancelled_before_first_attempt() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut calls = 0;
        let r: Result<(), _> = run_with_retry(&fast(100), &cancel, "test", |_| {
            calls += 1;
            Ok(())
        });
        assert!(matches!(r, Err(TransportError::Cancelled)));
        assert_eq!(calls, 0);
    }

    #[test]
    fn cancel_interrupts_wait() {
        let cancel = CancelToken::new();
        let policy = RetryPolicy {
            max_tries: 100,
            wait: Duration::from_secs(60),
        };
        let c2 = cancel.clone();
        let r: Result<(), _> = run_with_retry(&policy, &cancel, "test", |_| {
            c2.cancel();
            Err(TransportError::Http(500))
        });
        assert!(matches!(r, Err(TransportError::Cancelled)));
    }
}
