//! Allocation-amortising object pools.
//!
//! Each [`Pool<T>`] dispenses objects of one type, backed by a lock-free
//! free-list ([`crossbeam_queue::SegQueue`]). A tree built by several
//! `rayon` workers gives each worker its own pool chain; [`Pool::merge`]
//! folds one worker's free-list and counters into another's at teardown, as
//! described in §4.3/§5 of the design.

use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicU64, Ordering};

/// A poolable object knows how to wipe itself back to its "just allocated"
/// state so it can be handed out again without carrying stale data.
pub trait Poolable: Default {
    fn reset(&mut self);
}

/// Lock-free pool of reusable `T`s, with allocation/free counters used to
/// check the refcount-conservation invariant (§8) in tests.
pub struct Pool<T: Poolable> {
    free: SegQueue<T>,
    allocated: AtomicU64,
    freed: AtomicU64,
}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Poolable> Pool<T> {
    pub fn new() -> Self {
        Self {
            free: SegQueue::new(),
            allocated: AtomicU64::new(0),
            freed: AtomicU64::new(0),
        }
    }

    /// Reuses a freed object if one is available, otherwise allocates a
    /// fresh, default-initialized one.
    pub fn get(&self) -> T {
        match self.free.pop() {
            Some(mut item) => {
                item.reset();
                item
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                T::default()
            }
        }
    }

    /// Returns `item` to the free-list for reuse.
    pub fn put(&self, item: T) {
        self.freed.fetch_add(1, Ordering::Relaxed);
        self.free.push(item);
    }

    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }

    pub fn freed(&self) -> u64 {
        self.freed.load(Ordering::Relaxed)
    }

    /// Currently-outstanding (allocated but not yet freed) object count.
    pub fn outstanding(&self) -> u64 {
        self.allocated().saturating_sub(self.freed())
    }

    /// Drains `other`'s free-list into `self` and folds in its counters.
    /// Used to merge per-worker pools at build teardown.
    pub fn merge(&self, other: Pool<T>) {
        while let Some(item) = other.free.pop() {
            self.free.push(item);
        }
        self.allocated
            .fetch_add(other.allocated.load(Ordering::Relaxed), Ordering::Relaxed);
        self.freed
            .fetch_add(other.freed.load(Ordering::Relaxed), Ordering::Relaxed);
    }
}
