//! Range planning: split a resource into contiguous byte ranges.

use crate::probe::ResourceInfo;

/// One planned chunk of the resource: inclusive byte range `[start, end]`
/// plus the buffer its worker fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    /// Position in the plan; ranges are assembled in ascending index order.
    pub index: usize,
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (inclusive).
    pub end: u64,
    /// Destination for this range's bytes, sized `end - start + 1`.
    pub buffer: Vec<u8>,
    /// Bytes captured so far; the resume offset into `buffer`.
    pub filled: u64,
}

impl Range {
    pub fn new(index: usize, start: u64, end: u64) -> Self {
        let len = (end - start + 1) as usize;
        Self {
            index,
            start,
            end,
            buffer: vec![0; len],
            filled: 0,
        }
    }

    /// Length of this range in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.len()
    }
}

/// Number of ranges to use when the caller passes `requested`.
/// Non-positive values mean "one per available CPU".
pub fn resolve_parallelism(requested: i64) -> usize {
    if requested > 0 {
        return requested as usize;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Builds the range plan for a probed resource.
///
/// Without range support, or when `n <= 1`, the whole resource is one range.
/// Otherwise the first `n - 1` ranges get `length / n` bytes each and the last
/// one absorbs the remainder. `n` is clamped to `length` so that no range is
/// empty. Returns an empty plan for a zero-length resource.
pub fn plan(info: &ResourceInfo, n: usize) -> Vec<Range> {
    let length = info.length;
    if length == 0 {
        return Vec::new();
    }
    if !info.supports_range || n <= 1 {
        return vec![Range::new(0, 0, length - 1)];
    }

    let n = (n as u64).min(length);
    let chunk = length / n;

    let mut out = Vec::with_capacity(n as usize);
    for i in 0..n - 1 {
        out.push(Range::new(i as usize, i * chunk, (i + 1) * chunk - 1));
    }
    out.push(Range::new((n - 1) as usize, (n - 1) * chunk, length - 1));
    out
}
