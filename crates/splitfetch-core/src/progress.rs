//! Shared per-transfer progress and the progress-changed sampler.
//!
//! Workers bump one atomic byte counter per streamed block; that is the only
//! write contended across workers. Each bump also advances a generation
//! number under a mutex and wakes the sampler, which copies the state and
//! forwards it to observers. Readers may see a stale value but never a
//! smaller one than before.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::control::CancelToken;
use crate::events::Observers;

/// How long the sampler blocks before re-checking cancellation.
const WAIT_SLICE: Duration = Duration::from_millis(250);

/// Copy of a transfer's progress, as delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub file_url: String,
    pub bytes_downloaded: u64,
    pub file_length: u64,
}

impl ProgressSnapshot {
    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.file_length == 0 {
            return 1.0;
        }
        (self.bytes_downloaded as f64 / self.file_length as f64).min(1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_downloaded >= self.file_length
    }
}

#[derive(Debug, Default)]
struct Signal {
    generation: u64,
    finished: bool,
}

/// Progress of one transfer, shared by its workers and samplers.
#[derive(Debug)]
pub struct ProgressState {
    file_url: String,
    file_length: u64,
    downloaded: AtomicU64,
    signal: Mutex<Signal>,
    changed: Condvar,
}

impl ProgressState {
    pub fn new(file_url: &str, file_length: u64) -> Self {
        Self {
            file_url: file_url.to_string(),
            file_length,
            downloaded: AtomicU64::new(0),
            signal: Mutex::new(Signal::default()),
            changed: Condvar::new(),
        }
    }

    pub fn file_url(&self) -> &str {
        &self.file_url
    }

    pub fn file_length(&self) -> u64 {
        self.file_length
    }

    /// Count `n` freshly streamed bytes and wake the sampler.
    ///
    /// Never rolled back: bytes from an attempt that is later discarded stay
    /// counted, so this is telemetry, not a correctness signal.
    pub fn add(&self, n: u64) {
        self.downloaded.fetch_add(n, Ordering::SeqCst);
        let mut signal = self.signal.lock().unwrap_or_else(PoisonError::into_inner);
        signal.generation += 1;
        self.changed.notify_all();
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            file_url: self.file_url.clone(),
            bytes_downloaded: self.bytes_downloaded(),
            file_length: self.file_length,
        }
    }

    /// Counter has reached the resource length.
    pub fn is_complete(&self) -> bool {
        self.bytes_downloaded() >= self.file_length
    }

    /// Called by the engine after the join barrier; stops both samplers.
    pub fn mark_finished(&self) {
        let mut signal = self.signal.lock().unwrap_or_else(PoisonError::into_inner);
        signal.finished = true;
        signal.generation += 1;
        self.changed.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.signal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finished
    }

    pub fn generation(&self) -> u64 {
        self.signal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Block until the generation moves past `seen` or `timeout` elapses.
    /// Returns the current generation.
    pub fn wait_for_change(&self, seen: u64, timeout: Duration) -> u64 {
        let guard = self.signal.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |s| s.generation == seen)
            .unwrap_or_else(PoisonError::into_inner);
        guard.generation
    }
}

/// Progress-changed loop for one transfer.
///
/// Emits a zero-progress snapshot first, then one snapshot per wake-up.
/// Returns after emitting a snapshot that covers the whole resource, when
/// the engine marks the transfer finished, or when `cancel` fires.
pub fn run_progress_sampler(state: &ProgressState, observers: &Observers, cancel: &CancelToken) {
    tracing::debug!(url = state.file_url(), "progress sampler started");

    observers.progress_changed(&ProgressSnapshot {
        file_url: state.file_url.clone(),
        bytes_downloaded: 0,
        file_length: state.file_length,
    });

    let mut seen = 0;
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let generation = state.wait_for_change(seen, WAIT_SLICE);
        if generation == seen {
            continue;
        }
        seen = generation;
        let snapshot = state.snapshot();
        observers.progress_changed(&snapshot);
        if snapshot.is_complete() || state.is_finished() {
            break;
        }
    }

    tracing::debug!(url = state.file_url(), "progress sampler stopped");
}
