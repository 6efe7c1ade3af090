//! Synchronizer: the timed mirroring loop.
//!
//! Every cycle validates both roots, then runs the reconcile and prune
//! phases concurrently over their own snapshots and waits for both. The two
//! snapshots are taken independently, so an entry created in the source
//! between them may be picked up one cycle late.

use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::SyncConfig;
use crate::error::MirrorError;
use crate::fs::ensure_dir;
use crate::logger::Logger;
use crate::sync::cancel::CancellationContext;
use crate::sync::context::CycleContext;
use crate::sync::prune::prune;
use crate::sync::reconcile::reconcile;
use crate::sync::stats::{CycleCounters, CycleStats};

/// Engine lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Running,
    CycleInProgress,
    Waiting,
    Stopped,
}

/// Periodic one-way mirror from a source tree to a replica tree.
pub struct Synchronizer {
    config: Arc<SyncConfig>,
    logger: Arc<Logger>,
    cancel: CancellationContext,
    state: watch::Sender<SyncState>,
}

impl Synchronizer {
    /// Create a synchronizer. `cancel` is shared with the caller; cancelling
    /// it has the same effect as [`Synchronizer::stop`].
    pub fn new(config: SyncConfig, logger: Arc<Logger>, cancel: CancellationContext) -> Self {
        let (state, _) = watch::channel(SyncState::Idle);
        Self {
            config: Arc::new(config),
            logger,
            cancel,
            state,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationContext {
        &self.cancel
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Request cancellation. In-flight file operations finish normally.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Run cycles until cancelled. Ordinary cancellation returns `Ok(())`;
    /// the only error is starting an engine that is not idle.
    pub async fn start(&self) -> Result<()> {
        let mut started = false;
        self.state.send_if_modified(|state| {
            if *state == SyncState::Idle {
                *state = SyncState::Running;
                started = true;
            }
            started
        });
        if !started {
            bail!("synchronizer has already been started");
        }

        self.logger.log_important(format!(
            "Mirroring {} to {} every {} ms (comparator: {}, fragile: {})",
            self.config.source_display(),
            self.config.replica_display(),
            self.config.interval.as_millis(),
            self.config.comparator,
            self.config.fragile
        ));

        let mut cycle = 0u64;
        while !self.cancel.is_cancelled() {
            cycle += 1;
            self.state.send_replace(SyncState::CycleInProgress);
            self.logger.log(format!("Synchronization cycle {} started", cycle));

            let stats = self.run_cycle().await;
            if !stats.skipped {
                self.logger
                    .log_important(format!("Synchronization cycle {} finished: {}", cycle, stats));
            }

            if self.cancel.is_cancelled() {
                break;
            }

            self.state.send_replace(SyncState::Waiting);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        self.state.send_replace(SyncState::Stopped);
        self.logger.log_important("Synchronization stopped");
        Ok(())
    }

    /// Run a single reconcile + prune cycle and report what it did.
    pub async fn run_cycle(&self) -> CycleStats {
        let ctx = Arc::new(CycleContext {
            config: Arc::clone(&self.config),
            logger: Arc::clone(&self.logger),
            cancel: self.cancel.clone(),
            counters: CycleCounters::default(),
        });

        let source_present = tokio::fs::metadata(self.config.source_root())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !source_present {
            let err = MirrorError::MissingSource {
                path: self.config.source_root().to_path_buf(),
            };
            self.logger.log_error(err.to_string());
            if self.config.fragile {
                self.logger
                    .log_error("Fragile mode is enabled, cancelling synchronization");
                self.cancel.cancel();
            }
            return CycleStats {
                errors: 1,
                skipped: true,
                ..CycleStats::default()
            };
        }

        match ensure_dir(self.config.replica_root()).await {
            Ok(true) => {
                ctx.counters.record_dir_created();
                self.logger.log_important(format!(
                    "Created replica directory {}",
                    self.config.replica_display()
                ));
            }
            Ok(false) => {}
            Err(e) => {
                ctx.handle_error(&anyhow::Error::from(e));
                return ctx.counters.snapshot();
            }
        }

        let (reconciled, pruned) = tokio::join!(reconcile(Arc::clone(&ctx)), prune(Arc::clone(&ctx)));
        ctx.report(reconciled);
        ctx.report(pruned);

        ctx.counters.snapshot()
    }
}
