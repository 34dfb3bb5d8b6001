//! # apmul-exec
//!
//! The execution scheduler: batchable work is split into chunks and run
//! on a bounded work-stealing pool. A caller waiting for its chunks
//! executes other queued work instead of idling (the pool's native
//! blocking behavior), so nested parallel calls cannot starve the pool.

pub mod cancel;
pub mod runner;

pub use cancel::CancellationToken;
pub use runner::ParallelRunner;

/// Error type for scheduled work.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The originating thread was interrupted; every in-flight chunk
    /// observed the interruption and no partial result is returned.
    #[error("parallel task cancelled")]
    Cancelled,

    /// A chunk failed; the first failure wins.
    #[error("parallel task failed: {0}")]
    Failed(String),

    /// The worker pool could not be constructed.
    #[error("worker pool configuration error: {0}")]
    Pool(String),
}
