//! §8 invariants not already exercised by a concrete scenario test:
//! containment and index density.

mod common;

use common::ClosureEvaluator;
use nalgebra::SVector;
use xtree::region::Region;
use xtree::settings::BuildSettings;
use xtree::tree::{NodeKind, SimplexTree};
use xtree::{assign_indices, build};

fn sphere(p: SVector<f64, 3>) -> f64 {
    p.norm_squared() - 1.0
}

fn walk_leaves<const N: usize>(node: &SimplexTree<N>, f: &mut impl FnMut(&SimplexTree<N>)) {
    match &node.kind {
        NodeKind::Branch(children) => {
            for child in children {
                walk_leaves(child, f);
            }
        }
        NodeKind::Leaf(Some(_)) => f(node),
        NodeKind::Leaf(None) => {}
    }
}

#[test]
fn every_subspace_vertex_is_contained_in_its_leaf_region() {
    let eval = ClosureEvaluator::<3, _>::new(sphere, 4.0);
    let region = Region::<3>::cube(2.0).unwrap();
    let mut settings = BuildSettings::default();
    settings.min_feature = 0.25;

    let mut handle = build(eval, region, &settings).unwrap();
    xtree::stitch::stitch(&mut handle.root, &handle.pools);

    let epsilon = 1e-6;
    let mut checked = 0;
    walk_leaves(&handle.root, &mut |node| {
        if let NodeKind::Leaf(Some(leaf)) = &node.kind {
            for sub in leaf.sub.iter() {
                assert!(
                    node.region.contains(&sub.vert, epsilon),
                    "vertex {:?} escaped region {:?}",
                    sub.vert,
                    node.region
                );
                checked += 1;
            }
        }
    });
    assert!(checked > 0);
}

#[test]
fn index_assignment_is_dense_over_one_to_u() {
    let eval = ClosureEvaluator::<3, _>::new(sphere, 4.0);
    let region = Region::<3>::cube(2.0).unwrap();
    let mut settings = BuildSettings::default();
    settings.min_feature = 0.3;

    let mut handle = build(eval, region, &settings).unwrap();
    xtree::stitch::stitch(&mut handle.root, &handle.pools);
    let total = assign_indices(&handle.root);

    let mut seen = std::collections::HashSet::new();
    walk_leaves(&handle.root, &mut |node| {
        if let NodeKind::Leaf(Some(leaf)) = &node.kind {
            for sub in leaf.sub.iter() {
                let idx = sub.index();
                assert!(idx >= 1 && idx <= total, "index {idx} out of [1, {total}]");
                seen.insert(idx);
            }
        }
    });
    assert_eq!(seen.len() as u64, total, "indices are not densely packed");
}
