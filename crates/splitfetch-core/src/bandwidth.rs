//! Sliding-window throughput and ETA.
//!
//! The bandwidth sampler records one sample per tick for the life of a
//! transfer, whether or not bytes arrived in between. Every sample triggers a
//! recomputation over four trailing windows: the short ones react to stalls
//! and bursts, the one-minute window feeds the ETA.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::control::CancelToken;
use crate::events::Observers;
use crate::progress::ProgressState;

const WINDOW_1S_MS: u64 = 1_000;
const WINDOW_5S_MS: u64 = 5_000;
const WINDOW_30S_MS: u64 = 30_000;
const WINDOW_1M_MS: u64 = 60_000;

/// One tick's reading of a transfer's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BandwidthSample {
    /// Milliseconds since the transfer started.
    pub elapsed_ms: u64,
    /// Cumulative bytes counted at this tick.
    pub progress_bytes: u64,
    pub total_bytes: u64,
}

/// Throughput over the trailing windows, in bytes per second.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Bandwidth {
    pub file_url: String,
    pub mean_1s: u64,
    pub mean_5s: u64,
    pub mean_30s: u64,
    pub mean_1m: u64,
    /// Estimated seconds left, from the one-minute mean. `None` while that mean is zero.
    pub remaining: Option<u64>,
}

/// Append-only sample log of one transfer plus the last computed bandwidth.
#[derive(Debug, Clone, Default)]
pub struct BandwidthEstimator {
    samples: Vec<BandwidthSample>,
    current: Bandwidth,
}

impl BandwidthEstimator {
    pub fn new(file_url: &str) -> Self {
        Self {
            samples: Vec::new(),
            current: Bandwidth {
                file_url: file_url.to_string(),
                ..Bandwidth::default()
            },
        }
    }

    pub fn samples(&self) -> &[BandwidthSample] {
        &self.samples
    }

    pub fn current(&self) -> &Bandwidth {
        &self.current
    }

    /// Append a sample and recompute every window.
    pub fn record(&mut self, elapsed_ms: u64, progress_bytes: u64, total_bytes: u64) -> &Bandwidth {
        self.samples.push(BandwidthSample {
            elapsed_ms,
            progress_bytes,
            total_bytes,
        });

        let bw = &mut self.current;
        bw.mean_1s = window_rate(&self.samples, WINDOW_1S_MS, bw.mean_1s);
        bw.mean_5s = window_rate(&self.samples, WINDOW_5S_MS, bw.mean_5s);
        bw.mean_30s = window_rate(&self.samples, WINDOW_30S_MS, bw.mean_30s);
        bw.mean_1m = window_rate(&self.samples, WINDOW_1M_MS, bw.mean_1m);
        bw.remaining = if bw.mean_1m > 0 {
            Some(total_bytes.saturating_sub(progress_bytes) / bw.mean_1m)
        } else {
            None
        };

        &self.current
    }
}

/// Rate over the trailing `window_ms`, or `previous` if no time has passed.
///
/// Walks back from the newest sample to the first one at least `window_ms`
/// older. If the log is shorter than the window the rate is measured from
/// the transfer start (time 0, 0 bytes).
fn window_rate(samples: &[BandwidthSample], window_ms: u64, previous: u64) -> u64 {
    let Some(newest) = samples.last() else {
        return previous;
    };
    let base = samples
        .iter()
        .rev()
        .find(|s| newest.elapsed_ms.saturating_sub(s.elapsed_ms) >= window_ms);

    let (time_ms, bytes) = match base {
        Some(b) => (
            newest.elapsed_ms - b.elapsed_ms,
            newest.progress_bytes.saturating_sub(b.progress_bytes),
        ),
        None => (newest.elapsed_ms, newest.progress_bytes),
    };

    if time_ms == 0 {
        return previous;
    }
    (bytes as u128 * 1000 / time_ms as u128) as u64
}

/// Bandwidth loop for one transfer: one sample every `tick`.
///
/// Stops after recording a sample that covers the whole resource, when the
/// engine marks the transfer finished, or when `cancel` fires.
pub fn run_bandwidth_sampler(
    state: &ProgressState,
    observers: &Observers,
    cancel: &CancelToken,
    started: Instant,
    tick: Duration,
) {
    tracing::debug!(url = state.file_url(), "bandwidth sampler started");

    let mut estimator = BandwidthEstimator::new(state.file_url());
    loop {
        let finished = state.is_finished();
        let progress = state.bytes_downloaded();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let bandwidth = estimator.record(elapsed_ms, progress, state.file_length());
        observers.bandwidth_measured(bandwidth);

        if finished || progress >= state.file_length() {
            break;
        }
        if !cancel.sleep(tick) {
            break;
        }
    }

    tracing::debug!(
        url = state.file_url(),
        samples = estimator.samples().len(),
        "bandwidth sampler stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Recorder;
    use std::sync::Arc;

    #[test]
    fn zero_elapsed_keeps_default() {
        let mut est = BandwidthEstimator::new("u");
        let bw = est.record(0, 0, 1000).clone();
        assert_eq!(bw.mean_1s, 0);
        assert_eq!(bw.mean_1m, 0);
        assert_eq!(bw.remaining, None);
        // Second sample at the same instant: still no division.
        let bw = est.record(0, 500, 1000).clone();
        assert_eq!(bw.mean_1s, 0);
        assert_eq!(bw.remaining, None);
    }

    #[test]
    fn zero_elapsed_keeps_previous_value() {
        let mut est = BandwidthEstimator::new("u");
        est.record(100, 1000, 100_000);
        let before = est.current().clone();
        assert_eq!(before.mean_1s, 10_000);
        // base sample shares the newest timestamp
        let rate = window_rate(
            &[
                BandwidthSample {
                    elapsed_ms: 5,
                    progress_bytes: 10,
                    total_bytes: 10,
                },
                BandwidthSample {
                    elapsed_ms: 5,
                    progress_bytes: 20,
                    total_bytes: 10,
                },
            ],
            0,
            1234,
        );
        assert_eq!(rate, 1234);
    }

    #[test]
    fn short_log_measures_from_start() {
        let mut est = BandwidthEstimator::new("u");
        est.record(100, 1_000, 1_000_000);
        let bw = est.record(200, 2_000, 1_000_000).clone();
        // 2000 bytes in 200 ms for every window
        assert_eq!(bw.mean_1s, 10_000);
        assert_eq!(bw.mean_5s, 10_000);
        assert_eq!(bw.mean_30s, 10_000);
        assert_eq!(bw.mean_1m, 10_000);
        assert_eq!(bw.remaining, Some((1_000_000 - 2_000) / 10_000));
    }

    #[test]
    fn windows_differ_after_rate_change() {
        let mut est = BandwidthEstimator::new("u");
        let mut progress = 0u64;
        // 10 s at 1000 B/s, then 2 s at 5000 B/s, 100 ms ticks.
        for t in 1..=100u64 {
            progress += 100;
            est.record(t * 100, progress, 10_000_000);
        }
        for t in 101..=120u64 {
            progress += 500;
            est.record(t * 100, progress, 10_000_000);
        }
        let bw = est.current();
        assert_eq!(bw.mean_1s, 5_000);
        // 5 s window: 2 s fast + 3 s slow = 10_000 + 3_000 over 5 s
        assert_eq!(bw.mean_5s, 2_600);
        // longer windows reach back to the start: 20_000 bytes in 12 s
        assert_eq!(bw.mean_30s, 20_000 * 1000 / 12_000);
        assert_eq!(bw.mean_1m, bw.mean_30s);
        let expected_remaining = (10_000_000 - progress) / bw.mean_1m;
        assert_eq!(bw.remaining, Some(expected_remaining));
    }

    #[test]
    fn remaining_none_while_one_minute_mean_is_zero() {
        let mut est = BandwidthEstimator::new("u");
        for t in 1..=20u64 {
            let bw = est.record(t * 100, 0, 500);
            assert_eq!(bw.mean_1m, 0);
            assert_eq!(bw.remaining, None);
        }
    }

    #[test]
    fn stalled_transfer_drops_short_window_to_zero() {
        let mut est = BandwidthEstimator::new("u");
        for t in 1..=10u64 {
            est.record(t * 100, t * 1000, 1_000_000);
        }
        for t in 11..=30u64 {
            est.record(t * 100, 10_000, 1_000_000);
        }
        let bw = est.current();
        assert_eq!(bw.mean_1s, 0);
        assert!(bw.mean_1m > 0);
        assert!(bw.remaining.is_some());
    }

    #[test]
    fn samples_are_append_only() {
        let mut est = BandwidthEstimator::new("u");
        est.record(100, 10, 100);
        est.record(200, 20, 100);
        assert_eq!(est.samples().len(), 2);
        assert_eq!(est.samples()[0].progress_bytes, 10);
        assert_eq!(est.samples()[1].elapsed_ms, 200);
    }

    #[test]
    fn sampler_stops_when_complete() {
        let state = Arc::new(ProgressState::new("http://h/f", 100));
        let observers = Observers::new();
        let recorder = Arc::new(Recorder::default());
        observers.subscribe(recorder.clone());
        let cancel = CancelToken::new();

        let (s2, o2, c2) = (Arc::clone(&state), observers.clone(), cancel.clone());
        let started = Instant::now();
        let sampler = std::thread::spawn(move || {
            run_bandwidth_sampler(&s2, &o2, &c2, started, Duration::from_millis(5))
        });
        std::thread::sleep(Duration::from_millis(20));
        state.add(100);
        sampler.join().unwrap();

        let seen = recorder.bandwidth();
        assert!(seen.len() >= 2);
        assert!(seen.iter().all(|b| b.file_url == "http://h/f"));
    }

    #[test]
    fn sampler_stops_on_finish_and_cancel() {
        let state = Arc::new(ProgressState::new("u", 100));
        let observers = Observers::new();
        let cancel = CancelToken::new();
        let (s2, o2, c2) = (Arc::clone(&state), observers.clone(), cancel.clone());
        let sampler = std::thread::spawn(move || {
            run_bandwidth_sampler(&s2, &o2, &c2, Instant::now(), Duration::from_secs(60))
        });
        std::thread::sleep(Duration::from_millis(10));
        cancel.cancel();
        sampler.join().unwrap();

        let (s3, o3, c3) = (Arc::clone(&state), observers.clone(), CancelToken::new());
        state.mark_finished();
        run_bandwidth_sampler(&s3, &o3, &c3, Instant::now(), Duration::from_secs(60));
    }
}
