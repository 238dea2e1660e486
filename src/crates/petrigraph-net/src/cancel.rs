//! Cooperative cancellation for blocking analyses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation signal checked between units of work.
///
/// The validator checks it between marking expansions and the simulator
/// between steps. Cancellation is cooperative: setting the flag never
/// interrupts a step in flight, it only stops further progress. Clones
/// share the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
