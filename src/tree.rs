//! Recursive N-ary subdivision with interval-arithmetic pruning, per-leaf
//! QEF solving, and bottom-up collapse (§4.4–§4.6).
//!
//! Construction recurses with `rayon::join` over a binary split of each
//! node's `2^N` children (§9 "Bottom-up fan-in"): the worker that completes
//! the second half of a join runs `finish_branch` as its continuation, which
//! is the documented equivalent of the pending-counter fan-in — whichever
//! worker observes both halves done performs the collapse. `pending` is
//! still carried on the node as a sanity-checked invariant, not as the
//! actual synchronization primitive.

use crate::eval::Evaluator;
use crate::error::{Error, Result};
use crate::interval::Interval;
use crate::leaf::{SimplexLeaf, SimplexLeafSubspace, WorkerPools};
use crate::neighbor::{corner_count, subspace_count, CornerIndex, NeighborIndex, Trit};
use crate::qef::Qef;
use crate::region::Region;
use crate::settings::BuildSettings;
use nalgebra::SVector;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// A node of the simplex tree: either a branch with `2^N` children, or a
/// (possibly empty) leaf.
pub enum NodeKind<const N: usize> {
    Branch(Vec<SimplexTree<N>>),
    Leaf(Option<Box<SimplexLeaf<N>>>),
}

/// One node of the tree. `pending` starts at `2^N - 1` and is decremented as
/// a debug-asserted bookkeeping counter during fan-in (§3); the real
/// synchronization is `rayon::join`'s own happens-before relationship.
pub struct SimplexTree<const N: usize> {
    pub region: Region<N>,
    pub tag: Interval,
    pub kind: NodeKind<N>,
    pending: AtomicU32,
}

impl<const N: usize> SimplexTree<N> {
    fn terminal(region: Region<N>, tag: Interval) -> Self {
        Self {
            region,
            tag,
            kind: NodeKind::Leaf(None),
            pending: AtomicU32::new(0),
        }
    }

    /// `type() != Unknown` — every node returned from [`build`] satisfies
    /// this (§8 "Closure").
    pub fn is_done(&self) -> bool {
        self.tag.is_terminal()
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.kind, NodeKind::Branch(_))
    }

    fn level(&self) -> u32 {
        match &self.kind {
            NodeKind::Leaf(Some(leaf)) => leaf.level,
            _ => 0,
        }
    }
}

/// Owning handle to a finished build (§6 "Build output").
pub struct BuildHandle<const N: usize> {
    pub root: SimplexTree<N>,
    /// `true` if the build observed `settings.abort` and returned early;
    /// the tree is then "structurally valid but may be incomplete" (§5,
    /// §7 `Aborted`).
    pub aborted: bool,
    /// The pools every leaf/subspace in `root` was allocated from.
    /// [`crate::stitch::stitch`] needs this to reclaim subspaces it
    /// unifies away; tests use `pools.leaves`/`pools.subspaces`'
    /// [`crate::pool::Pool::allocated`]/[`crate::pool::Pool::freed`] to
    /// check refcount conservation after the tree is dropped.
    pub pools: WorkerPools<N>,
}

impl<const N: usize> BuildHandle<N> {
    /// Releases every leaf and subspace still reachable from `root` back to
    /// `pools`, so the refcount-conservation invariant (§8) holds once this
    /// returns. Leaves `root` replaced by an empty placeholder and `pools`
    /// still readable, so callers can check `pools.leaves`/`pools.subspaces`
    /// `allocated() == freed()` afterward. Call only once `root` is no
    /// longer needed (mesh/contour extraction and index assignment read
    /// `root` without mutating it, so they must run first).
    pub fn release(&mut self) {
        let placeholder = SimplexTree::terminal(self.root.region.clone(), Interval::Empty);
        let root = std::mem::replace(&mut self.root, placeholder);
        release_tree(root, &self.pools);
    }
}

fn release_tree<const N: usize>(node: SimplexTree<N>, pools: &WorkerPools<N>) {
    match node.kind {
        NodeKind::Branch(children) => {
            for child in children {
                release_tree(child, pools);
            }
        }
        NodeKind::Leaf(Some(leaf)) => leaf.release(&pools.subspaces, &pools.leaves),
        NodeKind::Leaf(None) => {}
    }
}

struct BuildCtx<'a, const N: usize> {
    settings: &'a BuildSettings,
    pools: &'a WorkerPools<N>,
    completed_leaves: AtomicU64,
    total_estimate: u64,
}

/// Builds the simplex tree for `eval` over `region` per `settings` (§4.4).
pub fn build<const N: usize, E: Evaluator<N>>(
    mut eval: E,
    region: Region<N>,
    settings: &BuildSettings,
) -> Result<BuildHandle<N>> {
    if N != 2 && N != 3 {
        return Err(Error::UnsupportedDimension);
    }
    if settings.min_feature <= 0.0 {
        return Err(Error::InvalidRegion);
    }
    log::debug!(
        "building simplex tree: region={:?} min_feature={} max_err={}",
        region,
        settings.min_feature,
        settings.max_err
    );

    let pools = WorkerPools::<N>::new();
    let total_estimate = estimate_total_leaves(&region, settings.min_feature, N);
    let ctx = BuildCtx {
        settings,
        pools: &pools,
        completed_leaves: AtomicU64::new(0),
        total_estimate,
    };
    let tape = eval.root_tape();

    let root = if settings.workers == 0 {
        build_node(&mut eval, region, &tape, 0, &ctx)
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.workers)
            .build()
            .map_err(|_| Error::ResourceExhaustion)?;
        pool.install(|| build_node(&mut eval, region, &tape, 0, &ctx))
    };

    let aborted = settings.abort.load(Ordering::Relaxed);
    if aborted {
        log::info!("build aborted after {} leaves", ctx.completed_leaves.load(Ordering::Relaxed));
    }

    Ok(BuildHandle {
        root,
        aborted,
        pools,
    })
}

fn estimate_total_leaves<const N: usize>(region: &Region<N>, min_feature: f64, n: usize) -> u64 {
    let ratio = (region.diagonal() / min_feature).max(1.0);
    ratio.powi(n as i32).round() as u64
}

fn build_node<const N: usize, E: Evaluator<N>>(
    eval: &mut E,
    region: Region<N>,
    tape: &E::Tape,
    depth: u32,
    ctx: &BuildCtx<N>,
) -> SimplexTree<N> {
    if ctx.settings.abort.load(Ordering::Relaxed) {
        return SimplexTree {
            region,
            tag: Interval::Ambiguous,
            kind: NodeKind::Leaf(None),
            pending: AtomicU32::new(0),
        };
    }

    let (mut tag, narrowed) = eval.interval(&region, tape);
    if !eval.is_safe() {
        log::warn!("evaluator reported an unsafe interval over region {:?}; degrading to Ambiguous", region);
        tag = Interval::Ambiguous;
    }

    if tag == Interval::Empty || tag == Interval::Filled {
        return SimplexTree::terminal(region, tag);
    }

    if region.diagonal() <= ctx.settings.min_feature || depth >= ctx.settings.max_depth {
        let node = eval_leaf(eval, region, &narrowed, ctx);
        report_progress(ctx);
        return node;
    }

    let child_regions = region.split();
    let children = build_children(eval, &child_regions, &narrowed, depth + 1, ctx);
    finish_branch(eval, region, children, &narrowed, ctx)
}

fn build_children<const N: usize, E: Evaluator<N>>(
    eval: &mut E,
    regions: &[Region<N>],
    tape: &E::Tape,
    depth: u32,
    ctx: &BuildCtx<N>,
) -> Vec<SimplexTree<N>> {
    if regions.len() == 1 {
        return vec![build_node(eval, regions[0].clone(), tape, depth, ctx)];
    }
    let mid = regions.len() / 2;
    let (left, right) = regions.split_at(mid);
    let mut right_eval = eval.for_worker();
    let (mut left_trees, mut right_trees) = rayon::join(
        || build_children(eval, left, tape, depth, ctx),
        || build_children(&mut right_eval, right, tape, depth, ctx),
    );
    left_trees.append(&mut right_trees);
    left_trees
}

fn report_progress<const N: usize>(ctx: &BuildCtx<N>) {
    let completed = ctx.completed_leaves.fetch_add(1, Ordering::Relaxed) + 1;
    if let Some(progress) = &ctx.settings.progress {
        progress(completed, ctx.total_estimate);
    }
}

/// §4.5: evaluates an ambiguous terminal cell into a leaf. Polls
/// `ctx.settings.abort` immediately before the corner batch, the same way
/// `build_node` polls it on recursive entry, since a full `2^N`-corner
/// derivative/feature batch can be the most expensive single step between
/// two poll points.
fn eval_leaf<const N: usize, E: Evaluator<N>>(
    eval: &mut E,
    region: Region<N>,
    tape: &E::Tape,
    ctx: &BuildCtx<N>,
) -> SimplexTree<N> {
    if ctx.settings.abort.load(Ordering::Relaxed) {
        return SimplexTree {
            region,
            tag: Interval::Ambiguous,
            kind: NodeKind::Leaf(None),
            pending: AtomicU32::new(0),
        };
    }

    let corners = corner_qefs(eval, &region, tape);
    let qefs = subspace_qefs::<N>(&corners);
    let (subs, tag, _max_error) = solve_and_classify(eval, &region, &qefs, tape, ctx.pools);

    match tag {
        Interval::Empty | Interval::Filled => {
            release_subspaces(subs, ctx.pools);
            SimplexTree::terminal(region, tag)
        }
        _ => {
            let mut leaf = ctx.pools.leaves.get();
            leaf.level = 0;
            leaf.sub = subs;
            SimplexTree {
                region,
                tag,
                kind: NodeKind::Leaf(Some(Box::new(leaf))),
                pending: AtomicU32::new(0),
            }
        }
    }
}

/// §4.5 step 2: one raw QEF per corner, from batched value+gradient
/// samples (or enumerated features when the derivative is ambiguous).
fn corner_qefs<const N: usize, E: Evaluator<N>>(
    eval: &mut E,
    region: &Region<N>,
    tape: &E::Tape,
) -> SmallVec<[Qef<N>; 8]> {
    let points: SmallVec<[SVector<f64, N>; 8]> =
        CornerIndex::<N>::all().map(|c| region.corner(c)).collect();
    let samples = eval.array_derivatives(&points, tape);

    let mut qefs = SmallVec::with_capacity(corner_count(N));
    for (point, (gradient, value, ambiguous)) in points.iter().zip(samples) {
        let mut qef = Qef::<N>::new();
        if ambiguous {
            for normal in eval.features(*point, tape) {
                qef.insert(*point, normal, 0.0);
            }
        } else {
            // Tangent-plane constraint from the first-order Taylor
            // expansion f(p) + ∇f(p)·(x - p) = 0, i.e. n·(x - p) = -f(p).
            qef.insert(*point, gradient, -value);
        }
        qefs.push(qef);
    }
    qefs
}

/// §4.5 step 3: from the `2^N` raw corner QEFs, builds all `3^N` subspace
/// QEFs. The body is the sum of every corner's raw QEF; every other
/// subspace (processed in decreasing dimension order) is the sum of the
/// already-computed QEFs of every subspace that strictly contains it,
/// projected onto its floating axes.
fn subspace_qefs<const N: usize>(corners: &[Qef<N>]) -> SmallVec<[Qef<N>; 27]> {
    let mut qefs: SmallVec<[Qef<N>; 27]> =
        (0..subspace_count(N)).map(|_| Qef::<N>::new()).collect();

    let body = NeighborIndex::<N>::body();
    let mut body_qef = Qef::<N>::new();
    for q in corners {
        body_qef += q;
    }
    qefs[body.index()] = body_qef;

    for dim in (0..N).rev() {
        for s in NeighborIndex::<N>::all() {
            if s.dimension() != dim {
                continue;
            }
            let mut acc = Qef::<N>::new();
            for r in NeighborIndex::<N>::all() {
                if r.dimension() > dim && r.contains(s) {
                    acc += &qefs[r.index()].sub(s.floating_mask());
                }
            }
            qefs[s.index()] = acc;
        }
    }
    qefs
}

/// Solves every one of the `3^N` subspace QEFs bounded to its own region,
/// classifies each vertex inside/outside, allocates fresh pooled storage
/// for each, and rolls the per-subspace classifications up into an overall
/// [`Interval`] (§4.5 steps 3–5).
fn solve_and_classify<const N: usize, E: Evaluator<N>>(
    eval: &mut E,
    region: &Region<N>,
    qefs: &[Qef<N>],
    tape: &E::Tape,
    pools: &WorkerPools<N>,
) -> (SmallVec<[Arc<SimplexLeafSubspace<N>>; 27]>, Interval, f64) {
    let mut subs = SmallVec::with_capacity(subspace_count(N));
    let mut max_error = 0.0_f64;
    let mut any_inside = false;
    let mut any_outside = false;

    for s in NeighborIndex::<N>::all() {
        let qef = &qefs[s.index()];
        let sub_region = region.subspace(s);
        let (vert, error) = qef.solve_bounded(&sub_region);
        max_error = max_error.max(error);

        if qef.is_degenerate() {
            log::warn!(
                "numeric degeneracy solving subspace {} of region {:?}; falling back to mean/region-center",
                s.index(),
                region
            );
        }

        let value = eval.value(vert, tape);
        let inside = if value == 0.0 {
            eval.is_inside(vert, tape)
        } else {
            value < 0.0
        };
        any_inside |= inside;
        any_outside |= !inside;

        let mut storage = pools.subspaces.get();
        storage.qef = qef.clone();
        storage.vert = vert;
        storage.inside = inside;
        subs.push(Arc::new(storage));
    }

    let tag = match (any_inside, any_outside) {
        (true, false) => Interval::Filled,
        (false, true) => Interval::Empty,
        _ => Interval::Ambiguous,
    };
    (subs, tag, max_error)
}

fn release_subspaces<const N: usize>(
    subs: SmallVec<[Arc<SimplexLeafSubspace<N>>; 27]>,
    pools: &WorkerPools<N>,
) {
    for arc in subs {
        if Arc::strong_count(&arc) == 1 {
            if let Ok(owned) = Arc::try_unwrap(arc) {
                pools.subspaces.put(owned);
            }
        }
    }
}

fn release_children<const N: usize>(children: Vec<SimplexTree<N>>, pools: &WorkerPools<N>) {
    for child in children {
        if let NodeKind::Leaf(Some(leaf)) = child.kind {
            leaf.release(&pools.subspaces, &pools.leaves);
        }
    }
}

/// §4.6: once all `2^N` children of a branch are done, decides whether to
/// keep the branch, collapse to a uniform terminal leaf, or (if
/// `max_err > 0.0` and the aggregated error is small enough) collapse into
/// a single feature-preserving leaf.
fn finish_branch<const N: usize, E: Evaluator<N>>(
    eval: &mut E,
    region: Region<N>,
    children: Vec<SimplexTree<N>>,
    tape: &E::Tape,
    ctx: &BuildCtx<N>,
) -> SimplexTree<N> {
    debug_assert_eq!(children.len(), corner_count(N));

    let any_branch = children.iter().any(SimplexTree::is_branch);
    if !any_branch {
        let joined = children
            .iter()
            .map(|c| c.tag)
            .reduce(Interval::join)
            .unwrap_or(Interval::Ambiguous);
        if joined == Interval::Empty || joined == Interval::Filled {
            release_children(children, ctx.pools);
            return SimplexTree::terminal(region, joined);
        }

        if ctx.settings.max_err > 0.0 {
            let acc = aggregate_children_qefs(&children);
            let (subs, computed_tag, max_error) =
                solve_and_classify(eval, &region, &acc, tape, ctx.pools);
            if max_error <= ctx.settings.max_err {
                let level = 1 + children.iter().map(SimplexTree::level).max().unwrap_or(0);
                release_children(children, ctx.pools);
                let mut leaf = ctx.pools.leaves.get();
                leaf.level = level;
                leaf.sub = subs;
                return SimplexTree {
                    region,
                    tag: computed_tag,
                    kind: NodeKind::Leaf(Some(Box::new(leaf))),
                    pending: AtomicU32::new(0),
                };
            }
            release_subspaces(subs, ctx.pools);
        }
    }

    SimplexTree {
        region,
        tag: Interval::Ambiguous,
        kind: NodeKind::Branch(children),
        pending: AtomicU32::new(0),
    }
}

/// The "one star per subspace" rule (§4.6): whether `child_subspace` of the
/// child occupying `corner`'s octant should contribute to its mapped parent
/// subspace, or is skipped here because a sibling will contribute the same
/// shared face/edge/corner instead.
fn counts_once<const N: usize>(corner: CornerIndex<N>, child_subspace: NeighborIndex<N>) -> bool {
    let fixed = child_subspace.fixed_mask();
    for axis in 0..N {
        if (fixed >> axis) & 1 == 1 {
            let subspace_high = matches!(child_subspace.trit(axis), Trit::High);
            if !(subspace_high || corner.is_high(axis)) {
                return false;
            }
        }
    }
    true
}

/// Maps a child's subspace to the parent subspace it coincides with: fixed
/// axes that sit on the parent's true boundary (the child's octant agrees
/// with the subspace's side) stay fixed; fixed axes that are actually an
/// internal seam between sibling children relax to floating.
fn map_child_subspace_to_parent<const N: usize>(
    corner: CornerIndex<N>,
    child_subspace: NeighborIndex<N>,
) -> NeighborIndex<N> {
    let mut index = 0usize;
    for axis in (0..N).rev() {
        let trit = match child_subspace.trit(axis) {
            Trit::Floating => Trit::Floating,
            fixed_trit => {
                let subspace_high = matches!(fixed_trit, Trit::High);
                if corner.is_high(axis) == subspace_high {
                    fixed_trit
                } else {
                    Trit::Floating
                }
            }
        };
        index = index * 3 + trit as usize;
    }
    NeighborIndex::new(index)
}

/// Aggregates every (non-branch) child's subspace QEFs into the parent's
/// `3^N` subspace QEF array, applying the one-star-per-subspace rule so
/// shared faces/edges/corners between siblings are counted exactly once.
/// Children contribute their subspace QEF as-is: a subspace whose fixed
/// axes become floating at the parent level already carries zero rows for
/// those axes, so no extra projection is needed on the way up — only the
/// same-cell projection within §4.5 step 3 ever calls [`Qef::sub`].
fn aggregate_children_qefs<const N: usize>(children: &[SimplexTree<N>]) -> SmallVec<[Qef<N>; 27]> {
    let mut acc: SmallVec<[Qef<N>; 27]> =
        (0..subspace_count(N)).map(|_| Qef::<N>::new()).collect();

    for (child_index, child) in children.iter().enumerate() {
        let corner = CornerIndex::<N>::new(child_index);
        let leaf = match &child.kind {
            NodeKind::Leaf(Some(leaf)) => leaf,
            _ => continue,
        };
        for child_subspace in NeighborIndex::<N>::all() {
            if !counts_once(corner, child_subspace) {
                continue;
            }
            let parent_subspace = map_child_subspace_to_parent(corner, child_subspace);
            acc[parent_subspace.index()] += &leaf.sub[child_subspace.index()].qef;
        }
    }
    acc
}
