//! §4.9: triangle extraction from the tree's dual complex.

use crate::dual::collect_crossings;
use crate::leaf::SimplexLeaf;
use crate::tree::{NodeKind, SimplexTree};
use log::warn;
use nalgebra::SVector;

/// A triangle mesh: `vertices[0]` is unused (global subspace indices start
/// at 1, per [`crate::index::assign_indices`]); `triangles` are triples of
/// indices into `vertices`, wound counter-clockwise when viewed from
/// outside the solid.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<SVector<f64, 3>>,
    pub triangles: Vec<[u64; 3]>,
}

/// Walks `tree`'s dual complex and emits a triangle for every shared edge
/// where exactly four equal-size leaves meet. `vertex_count` is the value
/// returned by [`crate::index::assign_indices`] for this tree.
pub fn extract(tree: &SimplexTree<3>, vertex_count: u64) -> Mesh {
    let mut vertices = vec![SVector::<f64, 3>::zeros(); vertex_count as usize + 1];
    fill_vertices(tree, &mut vertices);

    let mut triangles = Vec::new();
    for crossing in collect_crossings(tree) {
        if crossing.members.len() != 4 {
            warn!(
                "skipping crossing edge on axis {} with {} participating leaves (expected 4, likely an adaptive junction)",
                crossing.axis,
                crossing.members.len()
            );
            continue;
        }

        let mut ids: [u64; 4] = [0; 4];
        for (slot, (id, _)) in ids.iter_mut().zip(crossing.members.iter()) {
            *slot = *id;
        }
        ids.sort_unstable();

        let quad = if crossing.ascending {
            ids
        } else {
            [ids[3], ids[2], ids[1], ids[0]]
        };
        triangles.push([quad[0], quad[1], quad[2]]);
        triangles.push([quad[0], quad[2], quad[3]]);
    }

    Mesh { vertices, triangles }
}

fn fill_vertices(node: &SimplexTree<3>, vertices: &mut [SVector<f64, 3>]) {
    match &node.kind {
        NodeKind::Branch(children) => {
            for child in children {
                fill_vertices(child, vertices);
            }
        }
        NodeKind::Leaf(Some(leaf)) => record_leaf(leaf, vertices),
        NodeKind::Leaf(None) => {}
    }
}

fn record_leaf(leaf: &SimplexLeaf<3>, vertices: &mut [SVector<f64, 3>]) {
    for sub in leaf.sub.iter() {
        let idx = sub.index();
        if idx != 0 {
            vertices[idx as usize] = sub.vert;
        }
    }
}
