//! Quadratic Error Function accumulation and constrained minimization.
//!
//! A [`Qef`] accumulates weighted plane constraints `n·(x − p) = v` sampled
//! from an implicit function and produces, via [`Qef::solve_bounded`], the
//! position that best satisfies all of them while staying inside a region —
//! the feature-preserving vertex dual contouring is named for.

use crate::region::Region;
use nalgebra::{SMatrix, SVector};

/// Singular values (of the accumulated normal matrix) squared below this
/// threshold are treated as numerically zero and excluded from the
/// pseudo-inverse solve.
pub const EIGENVALUE_CUTOFF: f64 = 1e-10;

/// Accumulator for weighted `(position, normal, value)` samples in `N`
/// dimensions.
///
/// Internally this always stores a full `N × N` system; "projecting" onto a
/// lower-dimensional subspace ([`Qef::sub`]) doesn't change the type, it
/// eliminates the fixed axes by substituting their mean sample value and
/// zeroing the corresponding rows/columns, so that `+=`-combining several
/// projections (one per parent subspace sharing a child subspace) is just
/// ordinary matrix addition.
#[derive(Clone, Debug)]
pub struct Qef<const N: usize> {
    /// AᵀA: accumulated `n·nᵀ`.
    ata: SMatrix<f64, N, N>,
    /// Aᵀb: accumulated `n·(n·p + v)`.
    atb: SVector<f64, N>,
    /// bᵀb: accumulated `(n·p + v)²`.
    btb: f64,
    /// Σpᵢ, so the mean sample position is `mass_point / count`.
    mass_point: SVector<f64, N>,
    sum_v: f64,
    count: u64,
}

impl<const N: usize> Default for Qef<N> {
    fn default() -> Self {
        Self {
            ata: SMatrix::<f64, N, N>::zeros(),
            atb: SVector::<f64, N>::zeros(),
            btb: 0.0,
            mass_point: SVector::<f64, N>::zeros(),
            sum_v: 0.0,
            count: 0,
        }
    }
}

impl<const N: usize> Qef<N> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Accumulates the plane constraint `n·(x − p) = v`. A non-finite
    /// normal is replaced by the zero vector, so the sample still
    /// contributes position-only inertia (via `mass_point`) without
    /// corrupting the quadratic form.
    pub fn insert(&mut self, p: SVector<f64, N>, n: SVector<f64, N>, v: f64) {
        let normal = if n.iter().all(|c| c.is_finite()) {
            n
        } else {
            SVector::<f64, N>::zeros()
        };
        let b = normal.dot(&p) + v;
        self.ata += normal * normal.transpose();
        self.atb += normal * b;
        self.btb += b * b;
        self.mass_point += p;
        self.sum_v += v;
        self.count += 1;
    }

    /// Mean of the accumulated sample positions, or the origin if empty.
    pub fn mean(&self) -> SVector<f64, N> {
        if self.count == 0 {
            SVector::<f64, N>::zeros()
        } else {
            self.mass_point / self.count as f64
        }
    }

    /// `true` if every eigenvalue of the accumulated system is below
    /// [`EIGENVALUE_CUTOFF`] — the accumulator carries no useful plane
    /// information (e.g. zero samples, or all-parallel/duplicate normals)
    /// and any solve will fall back to the mean sample position.
    pub fn is_degenerate(&self) -> bool {
        self.count == 0 || self.ata.symmetric_eigen().eigenvalues.max() < EIGENVALUE_CUTOFF
    }

    /// Residual `‖Ax − b‖²` at `x`, clamped to `>= 0` to absorb floating
    /// point noise.
    pub fn residual(&self, x: &SVector<f64, N>) -> f64 {
        let quad = x.dot(&(self.ata * x)) - 2.0 * self.atb.dot(x) + self.btb;
        quad.max(0.0)
    }

    /// Projects this QEF onto the subspace whose floating axes are set in
    /// `floating_mask`, fixing the complementary axes at this QEF's own
    /// mean sample position. Used to sum higher-dimensional subspace QEFs
    /// down into a shared lower-dimensional subspace (§4.5-3 / §4.6).
    pub fn sub(&self, floating_mask: u32) -> Qef<N> {
        let fixed_mask = (!floating_mask) & full_mask(N);
        let mean = self.mean();
        self.eliminate(fixed_mask, &mean)
    }

    /// Eliminates the axes in `fixed_mask`, substituting `pinned`'s value
    /// for each, leaving a reduced system whose free directions are the
    /// complementary axes.
    fn eliminate(&self, fixed_mask: u32, pinned: &SVector<f64, N>) -> Qef<N> {
        let mut pinned_full = SVector::<f64, N>::zeros();
        for axis in 0..N {
            if bit(fixed_mask, axis) {
                pinned_full[axis] = pinned[axis];
            }
        }
        let shifted = self.ata * pinned_full;
        let mut atb = self.atb - shifted;
        let btb = self.btb - 2.0 * self.atb.dot(&pinned_full) + pinned_full.dot(&shifted);
        let mut ata = self.ata;
        for axis in 0..N {
            if bit(fixed_mask, axis) {
                for k in 0..N {
                    ata[(axis, k)] = 0.0;
                    ata[(k, axis)] = 0.0;
                }
                atb[axis] = 0.0;
            }
        }
        Qef {
            ata,
            atb,
            btb: btb.max(0.0),
            mass_point: self.mass_point,
            sum_v: self.sum_v,
            count: self.count,
        }
    }

    /// Rank-tolerant unconstrained minimizer of `‖Ax − b‖²`, centered on the
    /// mean sample position for numerical conditioning and solved via
    /// symmetric eigendecomposition with small eigenvalues discarded
    /// (minimum-norm solution in the well-conditioned subspace).
    fn unconstrained_minimizer(&self) -> SVector<f64, N> {
        let mean = self.mean();
        let rhs = self.atb - self.ata * mean;
        let eigen = self.ata.symmetric_eigen();
        let mut y = SVector::<f64, N>::zeros();
        for i in 0..N {
            let lambda = eigen.eigenvalues[i];
            if lambda >= EIGENVALUE_CUTOFF {
                let v = eigen.eigenvectors.column(i);
                let coeff = v.dot(&rhs) / lambda;
                y += v * coeff;
            }
        }
        mean + y
    }

    /// Solves for the position in `region` minimizing the accumulated
    /// error. If the unconstrained minimizer lies outside `region`, the
    /// violated axis is pinned to its bound and the (now lower-dimensional)
    /// problem is re-solved; this recurses at most `N` times. Returns the
    /// chosen position and its residual error.
    pub fn solve_bounded(&self, region: &Region<N>) -> (SVector<f64, N>, f64) {
        self.solve_recursive(region, 0, SVector::<f64, N>::zeros())
    }

    fn solve_recursive(
        &self,
        region: &Region<N>,
        fixed_mask: u32,
        pinned: SVector<f64, N>,
    ) -> (SVector<f64, N>, f64) {
        let full = full_mask(N);
        if fixed_mask == full {
            let error = self.residual(&pinned);
            return (pinned, error);
        }
        if self.count == 0 {
            let center = region.center();
            let mut x = pinned;
            for axis in 0..N {
                if !bit(fixed_mask, axis) {
                    x[axis] = center[axis];
                }
            }
            return (x, 0.0);
        }

        let reduced = self.eliminate(fixed_mask, &pinned);
        let mut candidate = reduced.unconstrained_minimizer();
        for axis in 0..N {
            if bit(fixed_mask, axis) {
                candidate[axis] = pinned[axis];
            }
        }

        if region.contains(&candidate, 1e-9) {
            let error = self.residual(&candidate);
            return (candidate, error);
        }

        let mut next_fixed = fixed_mask;
        let mut next_pinned = candidate;
        for axis in 0..N {
            if bit(fixed_mask, axis) {
                continue;
            }
            if candidate[axis] < region.lower[axis] {
                next_pinned[axis] = region.lower[axis];
                next_fixed |= 1 << axis;
                break;
            } else if candidate[axis] > region.upper[axis] {
                next_pinned[axis] = region.upper[axis];
                next_fixed |= 1 << axis;
                break;
            }
        }

        if next_fixed == fixed_mask {
            // Within tolerance of the boundary on every free axis: clamp
            // and stop rather than loop forever.
            let clamped = region.clamp(&candidate);
            return (clamped, self.residual(&clamped));
        }

        self.solve_recursive(region, next_fixed, next_pinned)
    }
}

impl<const N: usize> std::ops::AddAssign<&Qef<N>> for Qef<N> {
    fn add_assign(&mut self, other: &Qef<N>) {
        self.ata += other.ata;
        self.atb += other.atb;
        self.btb += other.btb;
        self.mass_point += other.mass_point;
        self.sum_v += other.sum_v;
        self.count += other.count;
    }
}

#[inline]
fn full_mask(n: usize) -> u32 {
    if n >= 32 {
        u32::MAX
    } else {
        (1 << n) - 1
    }
}

#[inline]
fn bit(mask: u32, axis: usize) -> bool {
    (mask >> axis) & 1 == 1
}
