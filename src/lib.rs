// Library module for dirmirror
// Re-exports modules for use in integration tests and the binary

pub mod compare;
pub mod config;
pub mod error;
pub mod fs;
pub mod logger;
pub mod sync;

pub use compare::{binary_equal, files_equal, md5_equal, sha256_equal, ComparatorKind};
pub use config::{Settings, SyncConfig};
pub use error::MirrorError;
pub use fs::RetryPolicy;
pub use logger::{Logger, Verbosity};
pub use sync::{CancellationContext, CycleStats, SyncState, Synchronizer};
