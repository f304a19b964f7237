//! # Bounded Blocking Pool
//!
//! A fixed set of slots handed out one caller at a time. Acquisition blocks
//! until a slot is free; the slot goes back to the pool when the guard drops,
//! including on early return and unwinding.

use parking_lot::{Condvar, Mutex};
use std::ops::{Deref, DerefMut};

/// Fixed-capacity pool of reusable values.
pub struct BoundedPool<T> {
    slots: Mutex<Vec<T>>,
    available: Condvar,
    capacity: usize,
}

impl<T> BoundedPool<T> {
    /// Create a pool holding exactly the given values.
    pub fn from_values(values: Vec<T>) -> Self {
        let capacity = values.len();
        Self {
            slots: Mutex::new(values),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Create a pool of `capacity` values built by `make`.
    pub fn with_capacity(capacity: usize, mut make: impl FnMut(usize) -> T) -> Self {
        Self::from_values((0..capacity).map(&mut make).collect())
    }

    /// Take a slot, blocking until one is free.
    pub fn acquire(&self) -> PoolGuard<'_, T> {
        let mut slots = self.slots.lock();
        loop {
            if let Some(value) = slots.pop() {
                return PoolGuard {
                    pool: self,
                    value: Some(value),
                };
            }
            self.available.wait(&mut slots);
        }
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self) -> Option<PoolGuard<'_, T>> {
        self.slots.lock().pop().map(|value| PoolGuard {
            pool: self,
            value: Some(value),
        })
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently handed out.
    pub fn available(&self) -> usize {
        self.slots.lock().len()
    }

    fn release(&self, value: T) {
        self.slots.lock().push(value);
        self.available.notify_one();
    }
}

impl BoundedPool<()> {
    /// A pool of `permits` empty slots, used as a counting semaphore.
    pub fn semaphore(permits: usize) -> Self {
        Self::with_capacity(permits, |_| ())
    }
}

/// Scoped ownership of one pool slot.
pub struct PoolGuard<'a, T> {
    pool: &'a BoundedPool<T>,
    value: Option<T>,
}

impl<T> Deref for PoolGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `Drop` takes the value out.
        match &self.value {
            Some(value) => value,
            None => unreachable!("pool guard used after release"),
        }
    }
}

impl<T> DerefMut for PoolGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("pool guard used after release"),
        }
    }
}

impl<T> Drop for PoolGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.release(value);
        }
    }
}
