//! Read-only control state shared with every stage
//!
//! Stages only ever see an immutable snapshot. The owner swaps in a new value
//! with [`SharedState::replace`]; stages pick it up on their next frame.

use parking_lot::RwLock;
use std::sync::Arc;

pub struct SharedState<S> {
    current: Arc<RwLock<Arc<S>>>,
}

impl<S> SharedState<S> {
    pub fn new(initial: S) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    /// Current snapshot. Holding it never blocks a writer for long; the lock
    /// is only held while cloning the `Arc`.
    pub fn snapshot(&self) -> Arc<S> {
        self.current.read().clone()
    }

    /// Atomically publish a new snapshot
    pub fn replace(&self, next: S) {
        *self.current.write() = Arc::new(next);
    }
}

impl<S> Clone for SharedState<S> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
        }
    }
}

impl<S: Default> Default for SharedState<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}
