//! Declarative parallel tasks over a bounded worker pool.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::{CancellationToken, TaskError};

/// Outcome of a parallel run whose chunks fail with `E`.
#[derive(Debug)]
pub enum RunError<E> {
    /// The run was cancelled; no chunk result is returned.
    Cancelled,
    /// The first chunk failure.
    Task(E),
}

/// A bounded work-stealing pool executing sub-range chunks of a
/// declarative parallel task.
///
/// The waiting caller participates in the pool while its chunks are
/// outstanding, executing other queued work rather than idling, so a
/// transform whose stages themselves schedule parallel work cannot
/// deadlock the pool.
pub struct ParallelRunner {
    pool: rayon::ThreadPool,
}

impl ParallelRunner {
    /// A runner over `processors` worker threads.
    pub fn new(processors: usize) -> Result<Self, TaskError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(processors.max(1))
            .thread_name(|i| format!("apmul-worker-{i}"))
            .build()
            .map_err(|err| TaskError::Pool(err.to_string()))?;
        Ok(Self { pool })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Split `[0, length)` into chunks of at least `min_batch` and run
    /// `task` on each chunk.
    ///
    /// Chunks observe `token` before starting; once it trips — from the
    /// caller or from a failing sibling chunk's internal abort — the
    /// remaining chunks return without running and the call surfaces a
    /// single [`RunError::Cancelled`] (or the first real failure).
    pub fn run<E, F>(
        &self,
        length: usize,
        min_batch: usize,
        token: &CancellationToken,
        task: F,
    ) -> Result<(), RunError<E>>
    where
        F: Fn(Range<usize>) -> Result<(), E> + Sync,
        E: Send,
    {
        if length == 0 {
            return if token.is_cancelled() {
                Err(RunError::Cancelled)
            } else {
                Ok(())
            };
        }

        let batch = batch_size(length, min_batch, self.threads());
        let aborted = AtomicBool::new(false);
        let first_error: Mutex<Option<E>> = Mutex::new(None);

        self.pool.install(|| {
            rayon::scope(|scope| {
                let mut start = 0;
                while start < length {
                    let end = (start + batch).min(length);
                    let task = &task;
                    let aborted = &aborted;
                    let first_error = &first_error;
                    scope.spawn(move |_| {
                        if token.is_cancelled() || aborted.load(Ordering::Relaxed) {
                            return;
                        }
                        if let Err(err) = task(start..end) {
                            aborted.store(true, Ordering::Relaxed);
                            first_error.lock().get_or_insert(err);
                        }
                    });
                    start = end;
                }
            });
        });

        if let Some(err) = first_error.into_inner() {
            return Err(RunError::Task(err));
        }
        if token.is_cancelled() {
            tracing::debug!("parallel task observed cancellation");
            return Err(RunError::Cancelled);
        }
        Ok(())
    }
}

impl ParallelRunner {
    /// Split a mutable slice into `chunk`-word pieces and run `task` on
    /// each piece concurrently. Pieces are disjoint, so chunks need no
    /// locking; ordering within one call is unspecified.
    pub fn run_chunks<E, F>(
        &self,
        data: &mut [u64],
        chunk: usize,
        token: &CancellationToken,
        task: F,
    ) -> Result<(), RunError<E>>
    where
        F: Fn(usize, &mut [u64]) -> Result<(), E> + Sync,
        E: Send,
    {
        use rayon::prelude::*;

        if data.is_empty() {
            return Ok(());
        }
        let chunk = chunk.max(1);
        self.pool.install(|| {
            data.par_chunks_mut(chunk)
                .enumerate()
                .try_for_each(|(index, piece)| {
                    if token.is_cancelled() {
                        return Err(RunError::Cancelled);
                    }
                    task(index, piece).map_err(RunError::Task)
                })
        })
    }
}

/// Chunk size: at least `min_batch`, oversubscribing the pool a few
/// times over so stealing can balance uneven chunks.
fn batch_size(length: usize, min_batch: usize, threads: usize) -> usize {
    let target = length.div_ceil(threads.max(1) * 4);
    target.max(min_batch).max(1)
}
