//! Single-slot, latest-wins hand-off between one producer and any number of
//! polling consumers.
//!
//! The slot starts empty. `publish` replaces whatever is stored (an unread
//! value is dropped); `take_copy` hands out the current value without
//! clearing it, so repeated reads see the same value until the next publish.
//! Values are immutable behind an `Arc` and swapped wholesale under the lock,
//! so a reader can never observe a half-written frame.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct FrameSlot<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    pub fn publish(&self, value: T) {
        self.publish_shared(Arc::new(value));
    }

    pub fn publish_shared(&self, value: Arc<T>) {
        // The old value is dropped after the guard is released.
        let _previous = self.lock().replace(value);
    }

    /// `None` until the first publish.
    pub fn take_copy(&self) -> Option<Arc<T>> {
        self.lock().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.lock().is_some()
    }

    // The slot only ever holds a complete value, so a panic elsewhere while
    // the lock was held cannot leave it inconsistent.
    fn lock(&self) -> MutexGuard<'_, Option<Arc<T>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
