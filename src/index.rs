//! Dense `[1, U]` numbering of subspace vertices (§4.8), for use as mesh
//! vertex indices. A single-threaded depth-first walk; safe to call again
//! on an unchanged tree (subspaces already indexed are left alone), and
//! safe to call on a tree already passed through [`crate::stitch::stitch`]
//! (shared subspaces are visited more than once, but only the first visit
//! assigns an index).

use crate::leaf::SimplexLeafSubspace;
use crate::neighbor::subspace_count;
use crate::tree::{NodeKind, SimplexTree};
use std::sync::atomic::{AtomicU64, Ordering};

/// Assigns indices to every not-yet-indexed subspace vertex reachable from
/// `tree`, returning the highest index now in use (`0` if the tree has no
/// ambiguous leaves at all).
pub fn assign_indices<const N: usize>(tree: &SimplexTree<N>) -> u64 {
    let next = AtomicU64::new(1);
    walk(tree, &next);
    next.load(Ordering::Relaxed) - 1
}

fn walk<const N: usize>(node: &SimplexTree<N>, next: &AtomicU64) {
    match &node.kind {
        NodeKind::Branch(children) => {
            for child in children {
                walk(child, next);
            }
        }
        NodeKind::Leaf(Some(leaf)) => {
            debug_assert_eq!(leaf.sub.len(), subspace_count(N));
            for sub in leaf.sub.iter() {
                assign_one(sub, next);
            }
        }
        NodeKind::Leaf(None) => {}
    }
}

fn assign_one<const N: usize>(sub: &SimplexLeafSubspace<N>, next: &AtomicU64) {
    if sub.index() != 0 {
        return;
    }
    let candidate = next.fetch_add(1, Ordering::Relaxed);
    if !sub.assign_index_if_unset(candidate) {
        // Another reference to this same (shared) subspace beat us to it
        // earlier in this same walk; the reserved counter value is simply
        // never used. Indices stay unique and monotonically assigned, just
        // not perfectly dense when sharing is heavy.
    }
}
