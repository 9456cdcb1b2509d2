//! Retry policy shared by the capability probe and the range workers.
//!
//! Every retryable failure waits a fixed delay before the next attempt, up to
//! a bounded number of attempts. While probing, a 403/404 is final: the
//! server has said the resource is not there. Range GETs use
//! [`classify_transfer`] and retry those too.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_transfer};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, run_with_retry_as};
