//! The evaluator capability set the core consumes as an opaque oracle.
//!
//! Building the expression tree this trait evaluates, and the concrete
//! point/array/interval/derivative/feature evaluators backing it, are
//! explicitly out of scope for this crate (§1) — they're owned by whatever
//! embeds the kernel. What lives here is just the interface the tree
//! builder, leaf evaluator, and mesher are written against.

use crate::interval::Interval;
use crate::region::Region;
use nalgebra::SVector;
use smallvec::SmallVec;

/// Capability bundle an implicit function must expose for [`crate::tree`]
/// to subdivide, evaluate, and mesh it.
///
/// Evaluators are **not** `Sync`: per §5, each worker thread owns its own
/// clone (sharing the same immutable expression tree/opcode stream), rather
/// than the tree being shared behind a lock. [`Evaluator::for_worker`] is
/// how the kernel obtains that clone.
pub trait Evaluator<const N: usize>: Send {
    /// Handle to a (possibly tape-narrowed) evaluation context. Interval
    /// evaluation over a region may narrow the tape to only the clauses
    /// active in that region; the narrowed handle is threaded into child
    /// recursion and the original is restored on return. `Sync` because a
    /// single tape is shared by reference across the `rayon::join` fan-out
    /// of a branch's children.
    type Tape: Clone + Send + Sync;

    /// The tape for the whole, unnarrowed expression.
    fn root_tape(&self) -> Self::Tape;

    /// Interval-arithmetic evaluation of `f` over `region`. Returns the
    /// occupancy tag and a tape narrowed to the clauses still active
    /// inside `region`.
    fn interval(&mut self, region: &Region<N>, tape: &Self::Tape) -> (Interval, Self::Tape);

    /// `false` if the most recent [`Evaluator::interval`] call produced a
    /// non-finite bound (the node is then forced `Ambiguous` rather than
    /// trusted — §4.4 step 1, §7 `EvaluatorUnsafe`).
    fn is_safe(&self) -> bool;

    /// Batched gradient + value at each of `points`, plus whether the
    /// derivative at that point is ambiguous (multiple features meet
    /// there). `points.len()` is expected to stay within the evaluator's
    /// own batch size (typically 256); the kernel never asks for more than
    /// `2^N` at once (one per corner).
    fn array_derivatives(
        &mut self,
        points: &[SVector<f64, N>],
        tape: &Self::Tape,
    ) -> SmallVec<[(SVector<f64, N>, f64, bool); 8]>;

    /// All one-sided surface normals at `point`, for use when its
    /// derivative was reported ambiguous.
    fn features(
        &mut self,
        point: SVector<f64, N>,
        tape: &Self::Tape,
    ) -> SmallVec<[SVector<f64, N>; 4]>;

    /// Single-point value, used to classify a solved subspace vertex as
    /// inside/outside (§4.5 step 4).
    fn value(&mut self, point: SVector<f64, N>, tape: &Self::Tape) -> f64;

    /// Containment oracle for the `f(point) == 0.0` tie-break.
    fn is_inside(&mut self, point: SVector<f64, N>, tape: &Self::Tape) -> bool;

    /// A fresh, independent evaluator for a new worker thread.
    fn for_worker(&self) -> Self
    where
        Self: Sized;
}
