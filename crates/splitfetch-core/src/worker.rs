//! Range worker: fetch one range into its buffer with bounded retry.
//!
//! When the server honors ranges a failed attempt resumes from the last
//! captured byte. When it does not, every attempt re-fetches the whole body
//! from offset 0, because a partial non-ranged response cannot be resumed.
//! The shared progress counter is not rolled back on such a reset.
//!
//! A server may advertise range support and still answer a ranged GET with
//! `200` and the whole body. The worker then drops everything before its
//! resume offset instead of copying the start of the file into the range.
//! Every failure is retried here, 403/404 included: the probe has already
//! decided that the resource exists.

use crate::config::EngineSettings;
use crate::control::CancelToken;
use crate::planner::Range;
use crate::probe::ResourceInfo;
use crate::progress::ProgressState;
use crate::retry::{classify_transfer, run_with_retry_as, RetryPolicy};
use crate::transport::{ByteRange, HttpTransport, TransportError};

/// Everything a worker borrows from its transfer.
#[derive(Clone, Copy)]
pub struct WorkerContext<'a> {
    pub transport: &'a dyn HttpTransport,
    pub info: &'a ResourceInfo,
    pub settings: &'a EngineSettings,
    pub progress: &'a ProgressState,
    pub cancel: &'a CancelToken,
}

/// Terminal state of a range worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Buffer fully populated.
    Succeeded,
    /// Attempts used up; the buffer holds whatever was captured.
    Exhausted,
    /// Downloader shut down before the range completed.
    Cancelled,
}

/// Fetch `range` until it is complete, attempts run out, or the downloader is cancelled.
pub fn fetch_range(ctx: &WorkerContext<'_>, range: &mut Range) -> RangeOutcome {
    tracing::debug!(
        index = range.index,
        start = range.start,
        end = range.end,
        "range worker started"
    );

    let policy = RetryPolicy::from(ctx.settings);
    let what = format!("range {} GET", range.index);
    let result = run_with_retry_as(&policy, ctx.cancel, &what, classify_transfer, |_| {
        let res = attempt(ctx, range);
        if res.is_err() && !ctx.info.supports_range && range.filled > 0 {
            tracing::debug!(
                index = range.index,
                discarded = range.filled,
                "no range support, restarting from offset 0"
            );
            range.filled = 0;
        }
        res
    });

    match result {
        Ok(()) => {
            tracing::debug!(index = range.index, bytes = range.filled, "range completed");
            RangeOutcome::Succeeded
        }
        Err(TransportError::Cancelled) => {
            tracing::debug!(index = range.index, offset = range.filled, "range cancelled");
            RangeOutcome::Cancelled
        }
        Err(e) => {
            tracing::warn!(
                index = range.index,
                offset = range.filled,
                len = range.len(),
                "range exhausted: {}",
                e
            );
            RangeOutcome::Exhausted
        }
    }
}

/// One GET: stream into the buffer from `range.filled`, block by block.
fn attempt(ctx: &WorkerContext<'_>, range: &mut Range) -> Result<(), TransportError> {
    let index = range.index;
    let resume_at = range.start + range.filled;
    let request = ctx
        .info
        .supports_range
        .then(|| ByteRange::new(resume_at, range.end));
    let block = ctx.settings.block_size;
    let expected = range.len();

    let mut cancelled = false;
    // Leading bytes to drop; decided on the first chunk, once the status is known.
    let mut skip: Option<u64> = None;
    let Range { buffer, filled, .. } = &mut *range;
    let mut sink = |status: u32, data: &[u8]| -> bool {
        if ctx.cancel.is_cancelled() {
            cancelled = true;
            return false;
        }
        let to_skip = skip.get_or_insert_with(|| {
            if request.is_some() && status != 206 && resume_at > 0 {
                tracing::warn!(index, status, offset = resume_at, "server ignored Range, skipping ahead");
                resume_at
            } else {
                0
            }
        });
        let dropped = (*to_skip).min(data.len() as u64);
        *to_skip -= dropped;
        let data = &data[dropped as usize..];

        for piece in data.chunks(block) {
            let pos = *filled as usize;
            let n = piece.len().min(buffer.len() - pos);
            if n == 0 {
                // Body runs past the end of this range.
                return false;
            }
            buffer[pos..pos + n].copy_from_slice(&piece[..n]);
            *filled += n as u64;
            ctx.progress.add(n as u64);
            if n < piece.len() {
                return false;
            }
        }
        true
    };
    ctx.transport
        .get(&ctx.info.url, request, ctx.settings.timeout, &mut sink)?;

    if cancelled {
        return Err(TransportError::Cancelled);
    }
    if range.filled < expected {
        return Err(TransportError::PartialTransfer {
            expected,
            received: range.filled,
        });
    }
    Ok(())
}
