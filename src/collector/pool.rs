//! Collector pool
//!
//! A fixed-capacity arena of reusable collectors: an index-addressed slab of
//! slots plus a stack of free slot indices. Slots are filled lazily by the
//! factory the first time they are handed out.

use crate::Result;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

enum Slot<T> {
    /// Never constructed
    Vacant,
    Idle(T),
    InUse,
}

struct PoolState<T> {
    slab: Vec<Slot<T>>,
    free: Vec<usize>,
}

/// A collector borrowed from a [`CollectorPool`]; hand it back with `release`
pub struct Pooled<T> {
    index: usize,
    collector: T,
}

impl<T> Pooled<T> {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.collector
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.collector
    }
}

pub struct CollectorPool<T> {
    state: Mutex<PoolState<T>>,
    available: Condvar,
    factory: Box<dyn Fn() -> Result<T> + Send + Sync>,
}

impl<T> CollectorPool<T> {
    /// Create a pool of `capacity` slots (at least one)
    pub fn new(capacity: usize, factory: impl Fn() -> Result<T> + Send + Sync + 'static) -> Self {
        let capacity = capacity.max(1);
        let slab = (0..capacity).map(|_| Slot::Vacant).collect();
        // Lowest index on top so slots are handed out in order
        let free = (0..capacity).rev().collect();
        Self {
            state: Mutex::new(PoolState { slab, free }),
            available: Condvar::new(),
            factory: Box::new(factory),
        }
    }

    /// Take a collector, blocking until one is free
    pub fn acquire(&self) -> Result<Pooled<T>> {
        let mut state = self.lock();
        let index = loop {
            if let Some(index) = state.free.pop() {
                break index;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        };
        self.take_slot(state, index)
    }

    /// Take a collector if one is free right now
    pub fn try_acquire(&self) -> Option<Result<Pooled<T>>> {
        let mut state = self.lock();
        let index = state.free.pop()?;
        Some(self.take_slot(state, index))
    }

    fn take_slot(&self, mut state: MutexGuard<'_, PoolState<T>>, index: usize) -> Result<Pooled<T>> {
        match std::mem::replace(&mut state.slab[index], Slot::InUse) {
            Slot::Idle(collector) => Ok(Pooled { index, collector }),
            Slot::Vacant | Slot::InUse => {
                drop(state);
                match (self.factory)() {
                    Ok(collector) => {
                        tracing::debug!(slot = index, "constructed collector");
                        Ok(Pooled { index, collector })
                    }
                    Err(e) => {
                        let mut state = self.lock();
                        state.slab[index] = Slot::Vacant;
                        state.free.push(index);
                        drop(state);
                        self.available.notify_one();
                        Err(e)
                    }
                }
            }
        }
    }

    /// Return a collector to the free list
    pub fn release(&self, pooled: Pooled<T>) {
        let mut state = self.lock();
        let Pooled { index, collector } = pooled;
        state.slab[index] = Slot::Idle(collector);
        state.free.push(index);
        drop(state);
        self.available.notify_one();
    }

    /// Give a slot back without its collector; the next `acquire` of the slot
    /// builds a fresh instance
    pub fn discard(&self, pooled: Pooled<T>) {
        let mut state = self.lock();
        state.slab[pooled.index] = Slot::Vacant;
        state.free.push(pooled.index);
        drop(state);
        drop(pooled);
        self.available.notify_one();
    }

    pub fn capacity(&self) -> usize {
        self.lock().slab.len()
    }

    /// Number of slots currently on the free list
    pub fn available(&self) -> usize {
        self.lock().free.len()
    }

    /// Number of collectors constructed so far
    pub fn constructed(&self) -> usize {
        self.lock()
            .slab
            .iter()
            .filter(|slot| !matches!(slot, Slot::Vacant))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
