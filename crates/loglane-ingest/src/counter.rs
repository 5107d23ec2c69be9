//! Process-wide running total of ingested log entries

use loglane_core::{Error, Result};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Running total of ingested entries since process start
///
/// Every update happens under one lock, so concurrent batches never lose
/// increments. The guard is never held across an `.await`.
#[derive(Debug, Default)]
pub struct IngestionCounter {
    total: Mutex<u64>,
}

impl IngestionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` entries and return the new total
    ///
    /// The total saturates at `u64::MAX` instead of wrapping.
    ///
    /// # Errors
    /// - `Error::Concurrency` if the lock was poisoned by a panicking holder
    pub fn add_entries(&self, n: u64) -> Result<u64> {
        let mut total = self.lock()?;
        let next = match total.checked_add(n) {
            Some(next) => next,
            None => {
                warn!(current = *total, added = n, "Ingestion counter saturated");
                u64::MAX
            }
        };
        *total = next;
        Ok(next)
    }

    /// Current total
    pub fn total(&self) -> Result<u64> {
        Ok(*self.lock()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, u64>> {
        self.total
            .lock()
            .map_err(|_| Error::Concurrency("ingestion counter lock poisoned".to_string()))
    }
}
