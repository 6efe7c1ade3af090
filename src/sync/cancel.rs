//! Cooperative cancellation shared between the caller and the engine.

use tokio_util::sync::CancellationToken;

/// Monotonic stop signal: once cancelled it stays cancelled.
///
/// Clones share the same underlying signal.
#[derive(Debug, Clone, Default)]
pub struct CancellationContext {
    token: CancellationToken,
}

impl CancellationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any task, any number of times.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
