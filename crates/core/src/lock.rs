//! Per-dataset lock table
//!
//! A process-wide lock keyed by dataset code. Each code gets its own slot in
//! a `DashMap`, so locking one dataset never contends with another.
//!
//! Locks are not tied to a thread: `lock` and `unlock` may be called from
//! different threads, which is what the metadata collaborator contract needs.

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct LockSlot {
    held: Mutex<bool>,
    released: Condvar,
}

/// Dataset-code keyed lock table.
#[derive(Default)]
pub struct LockTable {
    slots: DashMap<String, Arc<LockSlot>>,
}

impl LockTable {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, code: &str) -> Arc<LockSlot> {
        // Clone the Arc out so the shard guard is dropped before blocking.
        Arc::clone(
            self.slots
                .entry(code.to_string())
                .or_insert_with(|| Arc::new(LockSlot::default()))
                .value(),
        )
    }

    /// Block until the lock for `code` is acquired.
    pub fn lock(&self, code: &str) {
        let slot = self.slot(code);
        let mut held = slot.held.lock();
        while *held {
            slot.released.wait(&mut held);
        }
        *held = true;
    }

    /// Try to acquire the lock for `code`, waiting at most `timeout`.
    pub fn try_lock_for(&self, code: &str, timeout: Duration) -> bool {
        let slot = self.slot(code);
        let mut held = slot.held.lock();
        if *held {
            let result = slot
                .released
                .wait_while_for(&mut held, |held| *held, timeout);
            if result.timed_out() && *held {
                return false;
            }
        }
        *held = true;
        true
    }

    /// Release the lock for `code`. Releasing an unheld lock is a no-op.
    ///
    /// The slot is dropped once nobody holds or waits for it.
    pub fn unlock(&self, code: &str) {
        let slot = match self.slots.get(code).map(|s| Arc::clone(s.value())) {
            Some(slot) => slot,
            None => return,
        };
        {
            let mut held = slot.held.lock();
            *held = false;
            slot.released.notify_one();
        }
        drop(slot);
        // Waiters clone the slot under the shard lock, so a count of one
        // means only the table refers to it.
        self.slots
            .remove_if(code, |_, s| Arc::strong_count(s) == 1 && !*s.held.lock());
    }

    /// Whether the lock for `code` is currently held.
    pub fn is_locked(&self, code: &str) -> bool {
        self.slots
            .get(code)
            .map(|s| *s.value().held.lock())
            .unwrap_or(false)
    }
}
