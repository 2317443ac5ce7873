//! An adaptive simplex-tree isosurface extraction kernel.
//!
//! Turns an implicit function `f : ℝᴺ → ℝ` (the surface is `{x : f(x) = 0}`,
//! the solid is `{x : f(x) < 0}`) into a watertight, feature-preserving mesh
//! (`N = 3`) or a set of closed contours (`N = 2`), by recursively
//! subdividing a bounding [`Region`] into an octree/quadtree, accumulating a
//! per-subspace Quadratic Error Function (QEF) at each leaf, solving those
//! QEFs under region-bound constraints, and walking the resulting dual
//! complex to emit the surface.
//!
//! Building the `f` you want meshed — the expression tree and its
//! interval/derivative/feature evaluators — is out of scope here; bring your
//! own by implementing [`Evaluator`].
//!
//! ## Example
//!
//! ```ignore
//! # use xtree::*;
//! # fn example() -> Result<()> {
//! let region = Region::<3>::cube(2.0)?;
//! let settings = BuildSettings::default();
//! let mut handle = build(my_sphere_evaluator(), region, &settings)?;
//! stitch::stitch(&mut handle.root, &handle.pools);
//! let vertex_count = assign_indices(&handle.root);
//! let mesh = mesh::extract(&handle.root, vertex_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! * [`ahash`](https://crates.io/crates/ahash) – On by default. Faster
//!   hashing for the subspace-sharing and dual-complex bucket maps.
//!   Disabling this falls back to the slower
//!   [`HashMap`](std::collections::HashMap).

#[cfg(feature = "ahash")]
pub(crate) type HashMap<K, V> = ahash::AHashMap<K, V>;

#[cfg(not(feature = "ahash"))]
pub(crate) type HashMap<K, V> = std::collections::HashMap<K, V>;

pub mod contour;
pub mod dual;
pub mod error;
pub mod eval;
pub mod index;
pub mod interval;
pub mod leaf;
pub mod mesh;
pub mod neighbor;
pub mod pool;
pub mod qef;
pub mod region;
pub mod settings;
pub mod stitch;
pub mod tree;

pub use contour::Contours;
pub use error::{Error, Result};
pub use eval::Evaluator;
pub use index::assign_indices;
pub use mesh::Mesh;
pub use region::Region;
pub use settings::BuildSettings;
pub use tree::{build, BuildHandle, SimplexTree};
