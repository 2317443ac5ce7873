//! Build-time configuration for a tree build: target resolution, collapse
//! tolerance, depth cap, worker count, and cooperative cancellation/progress
//! hooks.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Parameters bundled into a single `build()` call (§6 "Build inputs").
#[derive(Clone)]
pub struct BuildSettings {
    /// Subdivision halts once a region's diagonal is at or below this.
    /// Must be `> 0.0`.
    pub min_feature: f64,
    /// Collapse tolerance compared against the maximum per-subspace QEF
    /// residual (§4.6, §9). `0.0` disables collapsing unconditionally.
    pub max_err: f64,
    /// Hard recursion depth cap, independent of `min_feature`.
    pub max_depth: u32,
    /// Worker thread count; `0` uses the platform default (hardware
    /// concurrency).
    pub workers: usize,
    /// Polled at every recursive entry and corner batch; set it to cancel
    /// an in-flight build (§5 "Cancellation").
    pub abort: Arc<AtomicBool>,
    /// Invoked with `(completed, total)` leaf-count approximations from
    /// arbitrary worker threads. Must be thread-safe.
    pub progress: Option<Arc<dyn Fn(u64, u64) + Send + Sync>>,
}

impl core::fmt::Debug for BuildSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BuildSettings")
            .field("min_feature", &self.min_feature)
            .field("max_err", &self.max_err)
            .field("max_depth", &self.max_depth)
            .field("workers", &self.workers)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Defaults matching §6: a generous feature size, collapsing disabled, a
/// deep-enough cap that `min_feature` is almost always the real limit, and
/// the platform's default worker count.
impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            min_feature: 0.1,
            max_err: 0.0,
            max_depth: 24,
            workers: 0,
            abort: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }
}
