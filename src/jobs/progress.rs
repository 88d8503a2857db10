// Progress reporting and cooperative cancellation primitives

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Sink for job progress updates. `progress` is in [0, 100].
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: f64, message: &str);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _progress: f64, _message: &str) {}
}

/// Maps a runner's local 0..100 progress into a [lo, hi] slice of the
/// job's overall progress.
pub struct ScopedProgress {
    inner: Arc<dyn ProgressSink>,
    lo: f64,
    hi: f64,
}

impl ScopedProgress {
    pub fn new(inner: Arc<dyn ProgressSink>, lo: f64, hi: f64) -> Self {
        Self { inner, lo, hi }
    }
}

impl ProgressSink for ScopedProgress {
    fn report(&self, progress: f64, message: &str) {
        let clamped = progress.clamp(0.0, 100.0);
        let mapped = self.lo + clamped / 100.0 * (self.hi - self.lo);
        self.inner.report(mapped, message);
    }
}

/// Shared cancellation flag. Cancelling is idempotent; runners observe
/// the flag at their checkpoints (daily boundaries in a backtest).
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
