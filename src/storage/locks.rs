//! Per-record mutual exclusion
//!
//! Link and unlink touch two transactions at once. Holding every id involved
//! for the duration of the operation keeps concurrent edits from observing
//! or producing a one-sided link.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};

use crate::error::{StrongboxError, StrongboxResult};
use crate::models::TransactionId;

/// Table of transaction ids currently held by an in-flight operation
#[derive(Default)]
pub struct RecordLocks {
    held: Mutex<HashSet<TransactionId>>,
    released: Condvar,
}

/// Releases its ids when dropped
pub struct RecordGuard<'a> {
    locks: &'a RecordLocks,
    ids: Vec<TransactionId>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until none of `ids` is held, then hold all of them
    ///
    /// All ids are taken together, so two callers asking for overlapping
    /// pairs in opposite order cannot deadlock.
    pub fn acquire(&self, ids: &[TransactionId]) -> StrongboxResult<RecordGuard<'_>> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();

        let mut held = self
            .held
            .lock()
            .map_err(|e| StrongboxError::Storage(format!("Failed to acquire record lock: {}", e)))?;
        while ids.iter().any(|id| held.contains(id)) {
            held = self
                .released
                .wait(held)
                .map_err(|e| StrongboxError::Storage(format!("Failed to wait for record lock: {}", e)))?;
        }
        held.extend(ids.iter().copied());

        Ok(RecordGuard { locks: self, ids })
    }

    pub fn is_held(&self, id: TransactionId) -> bool {
        self.held.lock().map(|held| held.contains(&id)).unwrap_or(false)
    }
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut held) = self.locks.held.lock() {
            for id in &self.ids {
                held.remove(id);
            }
        }
        self.locks.released.notify_all();
    }
}
