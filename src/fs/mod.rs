//! Filesystem layer: tree snapshots plus retrying copy/delete primitives.

pub mod ops;
pub mod retry;
pub mod scan;

pub use ops::{copy_file, delete_dir, delete_file, ensure_dir};
pub use retry::{is_transient, RetryPolicy};
pub use scan::{scan_tree, snapshot, EntryKind, TreeEntry};
