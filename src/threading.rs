//! Thread-pool plumbing for the one parallel region the pipeline runs
//! (ray-cast dispatch).
//!
//! There is no async work to poll across frames here — the whole step runs
//! synchronously on the caller's thread, parallelizing only inside
//! `raycast::dispatch` — so this wraps a single `rayon::ThreadPool` rather
//! than a fire-and-forget task executor, letting the embedder size it from
//! its own worker-thread budget.

use crate::error::SCMError;

/// Dedicated rayon pool, or `None` to use rayon's global pool.
pub struct ScmThreadPool {
    pool: Option<rayon::ThreadPool>,
}

impl ScmThreadPool {
    /// Use rayon's global thread pool, sized by rayon's own defaults.
    pub fn shared() -> Self {
        Self { pool: None }
    }

    /// Build a dedicated pool with exactly `num_threads` workers.
    pub fn dedicated(num_threads: usize) -> Result<Self, SCMError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| SCMError::ThreadPoolBuildFailed(e.to_string()))?;
        Ok(Self { pool: Some(pool) })
    }

    /// Number of worker threads this pool will use.
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(p) => p.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Run `f` on this pool (or the global pool), returning its result.
    pub fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(p) => p.install(f),
            None => f(),
        }
    }
}

impl Default for ScmThreadPool {
    fn default() -> Self {
        Self::shared()
    }
}
