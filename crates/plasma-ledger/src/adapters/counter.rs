//! In-process counter source backed by an `AtomicU64`.

use crate::domain::errors::StoreError;
use crate::ports::outbound::CounterSource;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter of the first record of block 1.
pub const FIRST_COUNTER: u64 = 1 << 32;

/// Atomic counter source. The first allocated counter is `1 << 32`, so block 0
/// never holds records.
#[derive(Debug)]
pub struct AtomicCounter {
    value: AtomicU64,
}

impl AtomicCounter {
    /// Counter whose next allocation is [`FIRST_COUNTER`].
    pub fn new() -> Self {
        Self::starting_after(FIRST_COUNTER - 1)
    }

    /// Counter whose next allocation is `value + 1`.
    pub fn starting_after(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for AtomicCounter {
    fn next_counter(&self) -> Result<u64, StoreError> {
        let previous = self.value.fetch_add(1, Ordering::SeqCst);
        previous
            .checked_add(1)
            .ok_or_else(|| StoreError::Backend("counter exhausted".into()))
    }

    fn reserve_up_to(&self, value: u64) -> Result<(), StoreError> {
        self.value.fetch_max(value, Ordering::SeqCst);
        Ok(())
    }

    fn current(&self) -> Result<u64, StoreError> {
        Ok(self.value.load(Ordering::SeqCst))
    }
}
