//! Shared closure-based `Evaluator` test double for the integration suite.
//!
//! Not a production evaluator (those are out of scope for this crate):
//! interval evaluation here is a conservative corner-sample-plus-Lipschitz-
//! slack approximation, and gradients are central finite differences rather
//! than a differentiated tape. Good enough to drive the kernel against
//! smooth closed-form functions in tests.

use nalgebra::SVector;
use smallvec::{smallvec, SmallVec};
use xtree::eval::Evaluator;
use xtree::interval::Interval;
use xtree::region::Region;

const FD_STEP: f64 = 1e-6;

/// Wraps any `Fn(point) -> f64` as an [`Evaluator`], given a global Lipschitz
/// bound on `|∇f|` used to conservatively widen corner samples into interval
/// bounds over a region.
#[derive(Clone)]
pub struct ClosureEvaluator<const N: usize, F> {
    pub f: F,
    pub lipschitz: f64,
}

impl<const N: usize, F> ClosureEvaluator<N, F>
where
    F: Fn(SVector<f64, N>) -> f64 + Clone + Send,
{
    pub fn new(f: F, lipschitz: f64) -> Self {
        Self { f, lipschitz }
    }

    fn gradient(&self, p: SVector<f64, N>) -> SVector<f64, N> {
        SVector::<f64, N>::from_fn(|axis, _| {
            let mut plus = p;
            let mut minus = p;
            plus[axis] += FD_STEP;
            minus[axis] -= FD_STEP;
            ((self.f)(plus) - (self.f)(minus)) / (2.0 * FD_STEP)
        })
    }
}

impl<const N: usize, F> Evaluator<N> for ClosureEvaluator<N, F>
where
    F: Fn(SVector<f64, N>) -> f64 + Clone + Send,
{
    type Tape = ();

    fn root_tape(&self) {}

    fn interval(&mut self, region: &Region<N>, _tape: &()) -> (Interval, ()) {
        use xtree::neighbor::CornerIndex;

        let mut min_val = f64::INFINITY;
        let mut max_val = f64::NEG_INFINITY;
        for corner in CornerIndex::<N>::all() {
            let value = (self.f)(region.corner(corner));
            min_val = min_val.min(value);
            max_val = max_val.max(value);
        }
        let slack = self.lipschitz * region.diagonal() * 0.5;
        let tag = if max_val + slack < 0.0 {
            Interval::Filled
        } else if min_val - slack > 0.0 {
            Interval::Empty
        } else {
            Interval::Ambiguous
        };
        (tag, ())
    }

    fn is_safe(&self) -> bool {
        true
    }

    fn array_derivatives(
        &mut self,
        points: &[SVector<f64, N>],
        _tape: &(),
    ) -> SmallVec<[(SVector<f64, N>, f64, bool); 8]> {
        points
            .iter()
            .map(|&p| (self.gradient(p), (self.f)(p), false))
            .collect()
    }

    fn features(&mut self, point: SVector<f64, N>, _tape: &()) -> SmallVec<[SVector<f64, N>; 4]> {
        smallvec![self.gradient(point)]
    }

    fn value(&mut self, point: SVector<f64, N>, _tape: &()) -> f64 {
        (self.f)(point)
    }

    fn is_inside(&mut self, point: SVector<f64, N>, _tape: &()) -> bool {
        (self.f)(point) < 0.0
    }

    fn for_worker(&self) -> Self {
        self.clone()
    }
}
