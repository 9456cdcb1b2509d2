use std::time::Duration;

use crate::config::EngineSettings;

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Server states the resource is unavailable (403, 404). Never retried.
    Absent,
    /// Timeout, connection failure, unexpected status, short body.
    Transient,
    /// The downloader is shutting down.
    Cancelled,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Fixed-delay retry policy with an attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_tries: u32,
    /// Delay between attempts.
    pub wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&EngineSettings::default())
    }
}

impl From<&EngineSettings> for RetryPolicy {
    fn from(s: &EngineSettings) -> Self {
        Self {
            max_tries: s.max_tries,
            wait: s.net_error_wait,
        }
    }
}

impl RetryPolicy {
    /// `attempt` is 1-based (1 = first attempt). Returns `RetryDecision::NoRetry`
    /// when we should stop retrying.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_tries {
            return RetryDecision::NoRetry;
        }
        match kind {
            ErrorKind::Absent | ErrorKind::Cancelled => RetryDecision::NoRetry,
            ErrorKind::Transient => RetryDecision::RetryAfter(self.wait),
        }
    }
}
