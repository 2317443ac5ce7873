use crate::error::{Error, Result};
use crate::neighbor::{corner_count, CornerIndex, NeighborIndex};
use nalgebra::SVector;
use smallvec::SmallVec;

/// An axis-aligned box in ℝᴺ.
///
/// For `N = 2`, `perp` carries the one auxiliary coordinate (typically the
/// height `z` of the slice) needed to evaluate a 2D region through a 3D
/// evaluator; for `N = 3` it is empty.
#[derive(Clone, Debug, PartialEq)]
pub struct Region<const N: usize> {
    pub lower: SVector<f64, N>,
    pub upper: SVector<f64, N>,
    pub perp: SmallVec<[f64; 1]>,
}

/// See [`Region::world_key`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct WorldKey<const N: usize> {
    lower: [u64; N],
    upper: [u64; N],
}

impl<const N: usize> Region<N> {
    /// Builds a region from explicit bounds. `lower` must be componentwise
    /// `<=` `upper`.
    pub fn new(lower: SVector<f64, N>, upper: SVector<f64, N>) -> Result<Self> {
        Self::with_perp(lower, upper, SmallVec::new())
    }

    /// As [`Region::new`], additionally carrying `perp` auxiliary
    /// coordinates (e.g. the slice height when meshing a 2D region with a
    /// 3D evaluator).
    pub fn with_perp(
        lower: SVector<f64, N>,
        upper: SVector<f64, N>,
        perp: SmallVec<[f64; 1]>,
    ) -> Result<Self> {
        for axis in 0..N {
            if lower[axis] > upper[axis] {
                return Err(Error::InvalidRegion);
            }
        }
        Ok(Self { lower, upper, perp })
    }

    /// The cube `[-extent, extent]^N`.
    pub fn cube(extent: f64) -> Result<Self> {
        Self::new(
            SVector::<f64, N>::repeat(-extent),
            SVector::<f64, N>::repeat(extent),
        )
    }

    #[inline]
    pub fn center(&self) -> SVector<f64, N> {
        (self.lower + self.upper) * 0.5
    }

    /// Euclidean length of the region's diagonal.
    #[inline]
    pub fn diagonal(&self) -> f64 {
        (self.upper - self.lower).norm()
    }

    /// Componentwise containment, with a small tolerance for floating-point
    /// slop accumulated by the QEF solve.
    pub fn contains(&self, point: &SVector<f64, N>, epsilon: f64) -> bool {
        (0..N).all(|axis| {
            point[axis] >= self.lower[axis] - epsilon
                && point[axis] <= self.upper[axis] + epsilon
        })
    }

    /// Clamps `point` componentwise into `[lower, upper]`.
    pub fn clamp(&self, point: &SVector<f64, N>) -> SVector<f64, N> {
        SVector::<f64, N>::from_fn(|axis, _| {
            point[axis].clamp(self.lower[axis], self.upper[axis])
        })
    }

    /// The corner at `index`, picking `upper[axis]` wherever the corner is
    /// `High` on that axis and `lower[axis]` otherwise.
    pub fn corner(&self, index: CornerIndex<N>) -> SVector<f64, N> {
        SVector::<f64, N>::from_fn(|axis, _| {
            if index.is_high(axis) {
                self.upper[axis]
            } else {
                self.lower[axis]
            }
        })
    }

    /// The lower-dimensional region addressed by `subspace`: fixed axes are
    /// collapsed to a single point (their `pos` bound), floating axes keep
    /// this region's bounds. A fixed axis is represented by `lower ==
    /// upper` on that axis rather than by dropping it from `N`, so a
    /// subspace region always has the same `N` as its parent.
    pub fn subspace(&self, subspace: NeighborIndex<N>) -> Region<N> {
        let fixed = subspace.fixed_mask();
        let pos = subspace.pos_mask();
        let mut lower = self.lower;
        let mut upper = self.upper;
        for axis in 0..N {
            if (fixed >> axis) & 1 == 1 {
                let bound = if (pos >> axis) & 1 == 1 {
                    self.upper[axis]
                } else {
                    self.lower[axis]
                };
                lower[axis] = bound;
                upper[axis] = bound;
            }
        }
        Region {
            lower,
            upper,
            perp: self.perp.clone(),
        }
    }

    /// A hashable, exact identifier of this region's world-space bounds.
    ///
    /// Two equal-size cells' corresponding subspace regions produce
    /// bit-identical bounds here: repeated midpoint bisection from the same
    /// root is exact in IEEE 754 binary floating point, so independently
    /// reaching the same grid line from different branches of the tree
    /// always lands on the same bit pattern. [`crate::stitch`] and
    /// [`crate::dual`] both use this to recognize when two leaves share a
    /// subspace without needing to consult each other mid-build.
    pub(crate) fn world_key(&self) -> WorldKey<N> {
        let mut lower = [0u64; N];
        let mut upper = [0u64; N];
        for axis in 0..N {
            lower[axis] = self.lower[axis].to_bits();
            upper[axis] = self.upper[axis].to_bits();
        }
        WorldKey { lower, upper }
    }

    /// Bisects every axis, returning the `2^N` children in [`CornerIndex`]
    /// order (child `i` occupies the side of the split that corner `i`
    /// sits on).
    pub fn split(&self) -> SmallVec<[Region<N>; 8]> {
        let mid = self.center();
        let mut children = SmallVec::with_capacity(corner_count(N));
        for child in CornerIndex::<N>::all() {
            let mut lower = self.lower;
            let mut upper = self.upper;
            for axis in 0..N {
                if child.is_high(axis) {
                    lower[axis] = mid[axis];
                } else {
                    upper[axis] = mid[axis];
                }
            }
            children.push(Region {
                lower,
                upper,
                perp: self.perp.clone(),
            });
        }
        children
    }
}
