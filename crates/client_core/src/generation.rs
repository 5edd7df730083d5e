use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Marks one issued request. Only the most recently issued token is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationToken(u64);

impl GenerationToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Monotonic epoch counter used to drop out-of-order responses.
///
/// Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct GenerationGuard {
    current: Arc<AtomicU64>,
}

impl GenerationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> GenerationToken {
        GenerationToken(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_live(&self, token: GenerationToken) -> bool {
        self.current.load(Ordering::SeqCst) == token.0
    }
}
