//! Bounded worker pool for one transfer's ranges.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::bandwidth::run_bandwidth_sampler;
use crate::events::Observers;
use crate::planner::Range;
use crate::progress::{run_progress_sampler, ProgressState};
use crate::worker::{fetch_range, RangeOutcome, WorkerContext};

/// Per-outcome counts of a finished pool.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolSummary {
    pub succeeded: usize,
    pub exhausted: usize,
    pub cancelled: usize,
}

impl PoolSummary {
    fn record(&mut self, outcome: RangeOutcome) {
        match outcome {
            RangeOutcome::Succeeded => self.succeeded += 1,
            RangeOutcome::Exhausted => self.exhausted += 1,
            RangeOutcome::Cancelled => self.cancelled += 1,
        }
    }

    fn merge(&mut self, other: PoolSummary) {
        self.succeeded += other.succeeded;
        self.exhausted += other.exhausted;
        self.cancelled += other.cancelled;
    }
}

/// Run every range to a terminal state on at most `ctx.settings.max_connections`
/// threads, with both samplers alongside. Returns once all of them have joined.
pub(crate) fn run_ranges(
    ctx: WorkerContext<'_>,
    observers: &Observers,
    state: &ProgressState,
    started: Instant,
    ranges: &mut [Range],
) -> PoolSummary {
    let threads = ranges.len().min(ctx.settings.max_connections).max(1);
    let tick = ctx.settings.sampler_tick;
    let queue: Mutex<VecDeque<&mut Range>> = Mutex::new(ranges.iter_mut().collect());

    let summary = std::thread::scope(|s| {
        let progress = s.spawn(|| run_progress_sampler(state, observers, ctx.cancel));
        let bandwidth = s.spawn(|| run_bandwidth_sampler(state, observers, ctx.cancel, started, tick));

        let workers: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    let mut summary = PoolSummary::default();
                    loop {
                        let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
                        let Some(range) = next else { break };
                        summary.record(fetch_range(&ctx, range));
                    }
                    summary
                })
            })
            .collect();

        let mut total = PoolSummary::default();
        for w in workers {
            match w.join() {
                Ok(part) => total.merge(part),
                Err(_) => tracing::error!(url = state.file_url(), "range worker panicked"),
            }
        }

        state.mark_finished();
        if progress.join().is_err() {
            tracing::error!(url = state.file_url(), "progress sampler panicked");
        }
        if bandwidth.join().is_err() {
            tracing::error!(url = state.file_url(), "bandwidth sampler panicked");
        }
        total
    });
    drop(queue);
    summary
}
