//! Per-cycle counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated concurrently by the units of one cycle.
#[derive(Debug, Default)]
pub struct CycleCounters {
    files_copied: AtomicU64,
    bytes_copied: AtomicU64,
    dirs_created: AtomicU64,
    files_deleted: AtomicU64,
    dirs_deleted: AtomicU64,
    errors: AtomicU64,
}

impl CycleCounters {
    pub fn record_copy(&self, bytes: u64) {
        self.files_copied.fetch_add(1, Ordering::Relaxed);
        self.bytes_copied.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_dir_created(&self) {
        self.dirs_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_deleted(&self) {
        self.files_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dir_deleted(&self) {
        self.dirs_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CycleStats {
        CycleStats {
            files_copied: self.files_copied.load(Ordering::Relaxed),
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            dirs_created: self.dirs_created.load(Ordering::Relaxed),
            files_deleted: self.files_deleted.load(Ordering::Relaxed),
            dirs_deleted: self.dirs_deleted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            skipped: false,
        }
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub files_copied: u64,
    pub bytes_copied: u64,
    pub dirs_created: u64,
    pub files_deleted: u64,
    pub dirs_deleted: u64,
    pub errors: u64,
    /// The cycle did not run because the source root was missing.
    pub skipped: bool,
}

impl CycleStats {
    /// Filesystem mutations performed during the cycle.
    pub fn operations(&self) -> u64 {
        self.files_copied + self.dirs_created + self.files_deleted + self.dirs_deleted
    }

    pub fn is_noop(&self) -> bool {
        self.operations() == 0
    }
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped {
            return f.write_str("skipped");
        }
        write!(
            f,
            "{} files copied ({}), {} directories created, {} files deleted, {} directories deleted, {} errors",
            self.files_copied,
            humansize::format_size(self.bytes_copied, humansize::DECIMAL),
            self.dirs_created,
            self.files_deleted,
            self.dirs_deleted,
            self.errors
        )
    }
}
