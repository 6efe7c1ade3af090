//! State shared by every unit of work within one cycle.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::config::SyncConfig;
use crate::logger::Logger;
use crate::sync::cancel::CancellationContext;
use crate::sync::stats::CycleCounters;

pub(crate) struct CycleContext {
    pub config: Arc<SyncConfig>,
    pub logger: Arc<Logger>,
    pub cancel: CancellationContext,
    pub counters: CycleCounters,
}

impl CycleContext {
    /// Error policy for a unit of work: log it, and under fragile mode ask
    /// the engine to stop. Units already running are left alone.
    pub fn handle_error(&self, err: &anyhow::Error) {
        self.counters.record_error();
        self.logger.log_error(format!("Error during synchronization: {:#}", err));

        if self.config.fragile {
            self.logger
                .log_error("Fragile mode is enabled, cancelling synchronization");
            self.cancel.cancel();
        }
    }

    pub fn report(&self, result: Result<()>) {
        if let Err(e) = result {
            self.handle_error(&e);
        }
    }

    /// Wait for every unit of a phase, routing failures through the error
    /// policy.
    pub async fn join_units(&self, mut units: JoinSet<Result<()>>) {
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(result) => self.report(result),
                Err(e) => self.handle_error(&anyhow!("worker task failed: {}", e)),
            }
        }
    }
}
