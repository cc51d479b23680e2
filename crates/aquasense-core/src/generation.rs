//! Monotonic generation counter for discarding stale async results.

use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out strictly increasing generation numbers.
///
/// A task takes a generation when it starts; when its result arrives it is
/// applied only if that generation is still the newest one issued
/// ([`is_current`](Self::is_current)) or newer than what was last applied.
#[derive(Debug, Default)]
pub struct Generation {
    latest: AtomicU64,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next generation. The first call returns 1.
    pub fn next(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The newest generation issued so far (0 if none).
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// `true` if no newer generation has been issued since `generation`.
    pub fn is_current(&self, generation: u64) -> bool {
        self.latest() == generation
    }
}
