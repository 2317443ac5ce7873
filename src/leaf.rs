//! Per-leaf, per-subspace state: the QEF-solved vertex records that are
//! shared between neighboring leaves and eventually numbered by
//! [`crate::index`] and walked by [`crate::mesh`]/[`crate::contour`].

use crate::neighbor::subspace_count;
use crate::pool::{Pool, Poolable};
use crate::qef::Qef;
use nalgebra::SVector;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-topological-subspace record owned (possibly jointly) by one or more
/// leaves.
///
/// Sharing is expressed with an [`Arc`]: `Arc::strong_count` *is* the
/// `refcount` the design describes, borrowing a neighbor's subspace is an
/// `Arc::clone`, and release drops the clone — the underlying storage
/// returns to its [`Pool`] only once the last owner lets go (see
/// [`SimplexLeaf::release`]).
///
/// `index` is an `AtomicU64` purely for interior mutability through a
/// shared `Arc` (once stitched, several leaves hold the same one); indexing
/// itself is a single-threaded pass (§4.8), not a concurrent one.
/// Once `index() > 0`, `vert` and `inside` are never written again.
#[derive(Debug, Default)]
pub struct SimplexLeafSubspace<const N: usize> {
    pub qef: Qef<N>,
    pub vert: SVector<f64, N>,
    pub inside: bool,
    index: AtomicU64,
}

impl<const N: usize> SimplexLeafSubspace<N> {
    /// `0` if unassigned, else this subspace's dense `[1, U]` index.
    pub fn index(&self) -> u64 {
        self.index.load(Ordering::Relaxed)
    }

    /// Assigns `value` iff this subspace is still unindexed. Returns
    /// `true` if the assignment took effect.
    pub(crate) fn assign_index_if_unset(&self, value: u64) -> bool {
        self.index
            .compare_exchange(0, value, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }
}

impl<const N: usize> Poolable for SimplexLeafSubspace<N> {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// An evaluated, undecomposed (or collapsed) cell: one subspace record per
/// entry of `sub`, indexed by [`crate::neighbor::NeighborIndex::index`].
pub struct SimplexLeaf<const N: usize> {
    /// 0 for a leaf produced directly by subdivision; `1 + max(child.level)`
    /// for one produced by collapsing children (§4.6).
    pub level: u32,
    pub sub: SmallVec<[Arc<SimplexLeafSubspace<N>>; 27]>,
}

impl<const N: usize> Default for SimplexLeaf<N> {
    fn default() -> Self {
        Self {
            level: 0,
            sub: SmallVec::new(),
        }
    }
}

impl<const N: usize> Poolable for SimplexLeaf<N> {
    fn reset(&mut self) {
        debug_assert!(
            self.sub.is_empty(),
            "leaf must be released via SimplexLeaf::release before recycling"
        );
        self.level = 0;
        self.sub.clear();
    }
}

impl<const N: usize> SimplexLeaf<N> {
    pub fn new(level: u32) -> Self {
        Self {
            level,
            sub: SmallVec::with_capacity(subspace_count(N)),
        }
    }

    /// Drops this leaf's references to every subspace, returning each
    /// subspace's storage to `pool` once its last owner has let go, then
    /// returns `self` to `leaf_pool`.
    pub fn release(mut self, pool: &Pool<SimplexLeafSubspace<N>>, leaf_pool: &Pool<SimplexLeaf<N>>) {
        for arc in self.sub.drain(..) {
            if Arc::strong_count(&arc) == 1 {
                if let Ok(owned) = Arc::try_unwrap(arc) {
                    pool.put(owned);
                }
            }
            // else: another leaf still references it; just drop this clone.
        }
        self.level = 0;
        leaf_pool.put(self);
    }
}

/// The pools a tree build draws leaf and subspace storage from, shared
/// (via `&`, lock-free `SegQueue`s underneath) across every `rayon` worker
/// rather than kept one-per-worker. [`WorkerPools::merge`] folds one
/// instance into another, for callers that do pool per subtree anyway.
pub struct WorkerPools<const N: usize> {
    pub leaves: Pool<SimplexLeaf<N>>,
    pub subspaces: Pool<SimplexLeafSubspace<N>>,
}

impl<const N: usize> Default for WorkerPools<N> {
    fn default() -> Self {
        Self {
            leaves: Pool::new(),
            subspaces: Pool::new(),
        }
    }
}

impl<const N: usize> WorkerPools<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&self, other: WorkerPools<N>) {
        self.leaves.merge(other.leaves);
        self.subspaces.merge(other.subspaces);
    }
}
