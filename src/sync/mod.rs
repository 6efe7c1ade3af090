//! Mirroring engine.
//!
//! This module drives the periodic one-way synchronization: a reconcile
//! phase that copies new and changed files, and a prune phase that removes
//! what the source no longer has.

pub mod cancel;
mod context;
pub mod engine;
mod prune;
mod reconcile;
pub mod stats;

pub use cancel::CancellationContext;
pub use engine::{SyncState, Synchronizer};
pub use stats::CycleStats;
