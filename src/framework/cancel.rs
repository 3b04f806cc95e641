use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Host-issued cancellation signal.
///
/// Clones share one flag. The engine polls it between units and before each
/// shard starts; a host enforcing a deadline cancels from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
