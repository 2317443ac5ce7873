//! Shared dual-complex walk backing both [`crate::mesh`] (3D) and
//! [`crate::contour`] (2D).
//!
//! A crossing happens at a dimension-1 subspace (an "edge": one floating
//! axis) whose two endpoint corners disagree on inside/outside. In 3D that
//! edge is nominally shared by `2^(N-1) = 4` leaves meeting around it; in
//! 2D, by `2^(N-1) = 2` leaves meeting across it. Both cases fall out of
//! the same walk parameterized by `N`, matching §4.9/§4.10's shared
//! phrasing ("minimal tuple of adjacent leaves meeting at a shared
//! edge"/"face-adjacent pairs").
//!
//! Grouping is by equal-size world-space location only (as in
//! [`crate::stitch`]): a crossing edge straddling leaves of different
//! depths (an adaptive T-junction) won't collect its full tuple and is
//! skipped rather than stitched into a transitional fan. Production dual
//! contouring implementations spend real complexity on exactly that case;
//! this kernel does not.

use crate::leaf::SimplexLeaf;
use crate::neighbor::NeighborIndex;
use crate::region::WorldKey;
use crate::tree::{NodeKind, SimplexTree};
use crate::HashMap;
use nalgebra::SVector;
use smallvec::SmallVec;

/// One crossing edge and the (up to `2^(N-1)`) leaf body vertices meeting
/// around it.
pub(crate) struct Crossing<const N: usize> {
    /// The edge's own floating axis.
    pub axis: usize,
    /// `true` if the edge's low-side endpoint is inside and its high-side
    /// endpoint is outside (the surface normal points toward `+axis`).
    pub ascending: bool,
    pub members: SmallVec<[(u64, SVector<f64, N>); 4]>,
}

pub(crate) fn collect_crossings<const N: usize>(tree: &SimplexTree<N>) -> Vec<Crossing<N>> {
    let mut buckets: HashMap<WorldKey<N>, Crossing<N>> = HashMap::new();
    walk(tree, &mut buckets);
    buckets.into_values().collect()
}

fn walk<const N: usize>(node: &SimplexTree<N>, buckets: &mut HashMap<WorldKey<N>, Crossing<N>>) {
    match &node.kind {
        NodeKind::Branch(children) => {
            for child in children {
                walk(child, buckets);
            }
        }
        NodeKind::Leaf(Some(leaf)) => collect_leaf(node, leaf, buckets),
        NodeKind::Leaf(None) => {}
    }
}

fn collect_leaf<const N: usize>(
    node: &SimplexTree<N>,
    leaf: &SimplexLeaf<N>,
    buckets: &mut HashMap<WorldKey<N>, Crossing<N>>,
) {
    let body = NeighborIndex::<N>::body();
    let body_entry = &leaf.sub[body.index()];

    for s in NeighborIndex::<N>::all() {
        if s.dimension() != 1 {
            continue;
        }
        let axis = floating_axis(s);
        let low = with_axis_fixed(s, axis, false);
        let high = with_axis_fixed(s, axis, true);
        let low_inside = leaf.sub[low.index()].inside;
        let high_inside = leaf.sub[high.index()].inside;
        if low_inside == high_inside {
            continue;
        }

        let key = node.region.subspace(s).world_key();
        let crossing = buckets.entry(key).or_insert_with(|| Crossing {
            axis,
            ascending: low_inside,
            members: SmallVec::new(),
        });
        crossing
            .members
            .push((body_entry.index(), body_entry.vert));
    }
}

fn floating_axis<const N: usize>(s: NeighborIndex<N>) -> usize {
    (0..N)
        .find(|&axis| matches!(s.trit(axis), crate::neighbor::Trit::Floating))
        .expect("dimension-1 subspace has exactly one floating axis")
}

fn with_axis_fixed<const N: usize>(s: NeighborIndex<N>, axis: usize, high: bool) -> NeighborIndex<N> {
    use crate::neighbor::Trit;
    let mut index = 0usize;
    for a in (0..N).rev() {
        let trit = if a == axis {
            if high {
                Trit::High
            } else {
                Trit::Low
            }
        } else {
            s.trit(a)
        };
        index = index * 3 + trit as usize;
    }
    NeighborIndex::new(index)
}
