//! Assembler: turns the completed range buffers into the destination file.
//!
//! Everything goes through a `.part` sibling that is created with truncation,
//! preallocated, written at each range's offset, synced and then renamed over
//! the destination. A failed assembly leaves no temp file behind.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
#[cfg(unix)]
use std::os::unix::{fs::FileExt, io::AsRawFd};

use crate::planner::Range;

pub const TEMP_SUFFIX: &str = ".part";

/// `file.iso` -> `file.iso.part`
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Write `ranges` to `path` in index order. Returns the file length.
///
/// Unfilled tails of exhausted ranges are written as zeros, so the file is
/// always as long as the planned resource.
pub fn assemble(path: &Path, ranges: &[Range]) -> Result<u64> {
    let tp = temp_path(path);
    match write_ranges(&tp, path, ranges) {
        Ok(len) => {
            tracing::debug!(path = %path.display(), bytes = len, ranges = ranges.len(), "file assembled");
            Ok(len)
        }
        Err(e) => {
            if tp.exists() {
                if let Err(rm) = std::fs::remove_file(&tp) {
                    tracing::warn!(path = %tp.display(), "failed to remove temp file: {}", rm);
                }
            }
            Err(e)
        }
    }
}

fn write_ranges(tp: &Path, path: &Path, ranges: &[Range]) -> Result<u64> {
    let mut ordered: Vec<&Range> = ranges.iter().collect();
    ordered.sort_by_key(|r| r.index);
    let total = ordered.iter().map(|r| r.end + 1).max().unwrap_or(0);

    let part = PartFile::create(tp, total)?;
    for r in ordered {
        part.write_at(r.start, &r.buffer)?;
    }
    part.commit(path)?;
    Ok(total)
}

/// The `.part` file being assembled. Writes are positional; the cursor is
/// never used.
struct PartFile {
    file: File,
    path: PathBuf,
}

impl PartFile {
    /// Create `path` with truncation and reserve `len` bytes.
    fn create(path: &Path, len: u64) -> Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("failed to create temp file: {}", path.display()))?;
        let part = PartFile {
            file,
            path: path.to_path_buf(),
        };
        part.reserve(len)?;
        Ok(part)
    }

    fn reserve(&self, len: u64) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        #[cfg(unix)]
        {
            let r = unsafe { libc::posix_fallocate(self.file.as_raw_fd(), 0, len as libc::off_t) };
            if r == 0 {
                return Ok(());
            }
            tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
        }
        self.file
            .set_len(len)
            .with_context(|| format!("failed to reserve {} bytes for {}", len, self.path.display()))
    }

    #[cfg(unix)]
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.file
            .write_all_at(data, offset)
            .with_context(|| format!("write of {} bytes at offset {} failed", data.len(), offset))
    }

    #[cfg(not(unix))]
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = &self.file;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)
            .with_context(|| format!("write of {} bytes at offset {} failed", data.len(), offset))
    }

    /// Sync, close and rename over `dest`, replacing whatever is there.
    fn commit(self, dest: &Path) -> Result<()> {
        let PartFile { file, path } = self;
        file.sync_all().context("temp file sync failed")?;
        drop(file);
        std::fs::rename(&path, dest)
            .with_context(|| format!("failed to rename {} to {}", path.display(), dest.display()))
    }
}
