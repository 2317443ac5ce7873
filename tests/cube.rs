//! Scenario 2 (§8): axis-aligned cube, sharp edges preserved.

mod common;

use common::ClosureEvaluator;
use nalgebra::SVector;
use xtree::region::Region;
use xtree::settings::BuildSettings;
use xtree::{assign_indices, build};

fn cube(p: SVector<f64, 3>) -> f64 {
    p.abs().max() - 1.0
}

fn face_normal(mesh: &xtree::Mesh, tri: &[u64; 3]) -> SVector<f64, 3> {
    let a = mesh.vertices[tri[0] as usize];
    let b = mesh.vertices[tri[1] as usize];
    let c = mesh.vertices[tri[2] as usize];
    (b - a).cross(&(c - a)).normalize()
}

#[test]
fn cube_mesh_preserves_sharp_edges() {
    let eval = ClosureEvaluator::<3, _>::new(cube, 2.0);
    let region = Region::<3>::cube(2.0).unwrap();
    let mut settings = BuildSettings::default();
    settings.min_feature = 0.25;

    let mut handle = build(eval, region, &settings).unwrap();
    xtree::stitch::stitch(&mut handle.root, &handle.pools);
    let vertex_count = assign_indices(&handle.root);
    let mesh = xtree::mesh::extract(&handle.root, vertex_count);
    assert!(!mesh.triangles.is_empty());

    // At least one pair of adjacent (edge-sharing) triangles should have
    // face normals ~90 degrees apart, evidence a sharp edge survived.
    let mut edge_faces: std::collections::HashMap<(u64, u64), Vec<usize>> =
        std::collections::HashMap::new();
    for (i, tri) in mesh.triangles.iter().enumerate() {
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            edge_faces.entry((a.min(b), a.max(b))).or_default().push(i);
        }
    }

    let mut found_right_angle = false;
    for faces in edge_faces.values() {
        if faces.len() == 2 {
            let n0 = face_normal(&mesh, &mesh.triangles[faces[0]]);
            let n1 = face_normal(&mesh, &mesh.triangles[faces[1]]);
            let cos = n0.dot(&n1).clamp(-1.0, 1.0);
            if cos.abs() < 0.3 {
                found_right_angle = true;
                break;
            }
        }
    }
    assert!(found_right_angle, "expected at least one sharp (~90 degree) edge");

    handle.release();
    assert_eq!(handle.pools.leaves.allocated(), handle.pools.leaves.freed());
    assert_eq!(
        handle.pools.subspaces.allocated(),
        handle.pools.subspaces.freed()
    );
}
