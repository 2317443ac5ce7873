//! §4.10: line-segment extraction from the tree's dual complex, the 2D
//! sibling of [`crate::mesh`].

use crate::dual::collect_crossings;
use crate::leaf::SimplexLeaf;
use crate::tree::{NodeKind, SimplexTree};
use log::warn;
use nalgebra::SVector;

/// A set of oriented line segments: `vertices[0]` is unused, `segments` are
/// pairs of indices into `vertices` directed so the solid lies to the
/// segment's left.
#[derive(Debug, Clone, Default)]
pub struct Contours {
    pub vertices: Vec<SVector<f64, 2>>,
    pub segments: Vec<[u64; 2]>,
}

/// As [`crate::mesh::extract`], but for a 2D tree: each crossing "edge" here
/// is a face-adjacent pair of cells, so a valid crossing has exactly two
/// participating leaves rather than four.
pub fn extract(tree: &SimplexTree<2>, vertex_count: u64) -> Contours {
    let mut vertices = vec![SVector::<f64, 2>::zeros(); vertex_count as usize + 1];
    fill_vertices(tree, &mut vertices);

    let mut segments = Vec::new();
    for crossing in collect_crossings(tree) {
        if crossing.members.len() != 2 {
            warn!(
                "skipping crossing edge on axis {} with {} participating leaves (expected 2, likely an adaptive junction)",
                crossing.axis,
                crossing.members.len()
            );
            continue;
        }
        let (a, _) = crossing.members[0];
        let (b, _) = crossing.members[1];
        segments.push(if crossing.ascending { [a, b] } else { [b, a] });
    }

    Contours { vertices, segments }
}

fn fill_vertices(node: &SimplexTree<2>, vertices: &mut [SVector<f64, 2>]) {
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

fn record_leaf(leaf: &SimplexLeaf<2>, vertices: &mut [SVector<f64, 2>]) {
    for sub in leaf.sub.iter() {
        let idx = sub.index();
        if idx != 0 {
            vertices[idx as usize] = sub.vert;
        }
    }
}
