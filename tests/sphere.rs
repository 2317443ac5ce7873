//! Scenario 1 (§8): unit sphere, closed watertight manifold with χ = 2.

mod common;

use common::ClosureEvaluator;
use nalgebra::SVector;
use std::collections::HashMap;
use xtree::region::Region;
use xtree::settings::BuildSettings;
use xtree::{assign_indices, build};

fn sphere(p: SVector<f64, 3>) -> f64 {
    p.norm_squared() - 1.0
}

#[test]
fn unit_sphere_is_watertight_with_euler_characteristic_two() {
    let eval = ClosureEvaluator::<3, _>::new(sphere, 4.0);
    let region = Region::<3>::cube(2.0).unwrap();
    let mut settings = BuildSettings::default();
    settings.min_feature = 0.25;

    let mut handle = build(eval, region, &settings).unwrap();
    assert!(!handle.aborted);
    xtree::stitch::stitch(&mut handle.root, &handle.pools);
    let vertex_count = assign_indices(&handle.root);
    let mesh = xtree::mesh::extract(&handle.root, vertex_count);

    assert!(!mesh.triangles.is_empty());

    // Watertight: every undirected edge touches exactly two triangles.
    let mut edge_counts: HashMap<(u64, u64), u32> = HashMap::new();
    for tri in &mesh.triangles {
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            *edge_counts.entry((a.min(b), a.max(b))).or_insert(0) += 1;
        }
    }
    assert!(edge_counts.values().all(|&c| c == 2));

    // Euler characteristic V - E + F = 2 for a topological sphere.
    let used_vertices: std::collections::HashSet<u64> = mesh
        .triangles
        .iter()
        .flat_map(|t| t.iter().copied())
        .collect();
    let v = used_vertices.len() as i64;
    let e = edge_counts.len() as i64;
    let f = mesh.triangles.len() as i64;
    assert_eq!(v - e + f, 2);

    // Containment: every vertex lies near the unit sphere.
    for &id in &used_vertices {
        let p = mesh.vertices[id as usize];
        assert!((p.norm() - 1.0).abs() < 0.1, "vertex off-surface: {p:?}");
    }

    handle.release();
    assert_eq!(handle.pools.leaves.allocated(), handle.pools.leaves.freed());
    assert_eq!(
        handle.pools.subspaces.allocated(),
        handle.pools.subspaces.freed()
    );
}

#[test]
fn indexing_is_idempotent() {
    let eval = ClosureEvaluator::<3, _>::new(sphere, 4.0);
    let region = Region::<3>::cube(2.0).unwrap();
    let mut settings = BuildSettings::default();
    settings.min_feature = 0.4;

    let mut handle = build(eval, region, &settings).unwrap();
    xtree::stitch::stitch(&mut handle.root, &handle.pools);
    let first = assign_indices(&handle.root);
    let second = assign_indices(&handle.root);
    assert_eq!(first, second);
}
