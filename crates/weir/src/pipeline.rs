//! Pipeline building blocks on top of [`WorkerPool`].
//!
//! - [`stage`] runs a single-worker pool. Its output keeps the input order and
//!   can become the next stage's queue through
//!   [`ResultStream::into_queue`].
//! - [`fan_out`] starts several single-worker branches on one shared queue,
//!   each with its own output stream. Feed the streams to
//!   [`merge`](crate::merge) to fan them back in.

use crate::{
    error::{Error, Result},
    pool::{PoolConfig, PoolReport, WorkerPool},
    queue::TaskQueue,
    sink::{self, ResultStream},
    transform::Transform,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Starts a single-worker stage reading `queue` and writing a new stream of
/// at most `capacity` buffered results.
///
/// # Errors
///
/// Never fails for a valid transform; the `Result` mirrors
/// [`WorkerPool::start`].
pub fn stage<T, X>(
    queue: TaskQueue<T>,
    capacity: usize,
    transform: X,
) -> Result<(WorkerPool<X::Output>, ResultStream<X::Output>)>
where
    T: Send + 'static,
    X: Transform<T>,
{
    let (results_tx, results) = sink::bounded(capacity);
    let pool = WorkerPool::start(&PoolConfig::new(1), queue, results_tx, transform)?;
    Ok((pool, results))
}

/// Independent branches started by [`fan_out`].
pub struct FanOut<R> {
    branches: Vec<WorkerPool<R>>,
    shutdown_token: CancellationToken,
}

impl<R: Send + 'static> FanOut<R> {
    pub fn num_branches(&self) -> usize {
        self.branches.len()
    }

    /// Stops every branch after its current item.
    pub fn cancel(&self) {
        self.shutdown_token.cancel();
    }

    /// Waits for every branch and combines their reports. Worker ids in the
    /// combined report are branch indices.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerJoin`] if a branch could not be joined.
    pub async fn join(self) -> Result<PoolReport> {
        let mut combined = PoolReport::default();
        for (branch, pool) in self.branches.into_iter().enumerate() {
            let report = pool.join().await.map_err(|e| match e {
                Error::WorkerJoin { reason, .. } => Error::WorkerJoin {
                    worker_id: branch,
                    reason,
                },
                other => other,
            })?;
            for mut worker in report.workers {
                worker.worker_id = branch;
                for failure in &mut worker.failures {
                    failure.worker_id = branch;
                }
                combined.workers.push(worker);
            }
        }
        Ok(combined)
    }
}

/// Starts `branches` single-worker pools that all read from `queue`.
///
/// Every item goes to exactly one branch. Each branch writes to its own
/// stream of at most `capacity` buffered results, which closes when that
/// branch is done.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] if `branches` is 0. Nothing is spawned.
pub fn fan_out<T, X>(
    queue: TaskQueue<T>,
    branches: usize,
    capacity: usize,
    transform: X,
) -> Result<(FanOut<X::Output>, Vec<ResultStream<X::Output>>)>
where
    T: Send + 'static,
    X: Transform<T>,
{
    if branches == 0 {
        return Err(Error::InvalidConfig {
            reason: "fan-out needs at least one branch".to_string(),
        });
    }

    let transform = Arc::new(transform);
    let shutdown_token = CancellationToken::new();
    let config = PoolConfig::new(1).with_shutdown_token(shutdown_token.clone());

    let mut pools = Vec::with_capacity(branches);
    let mut streams = Vec::with_capacity(branches);
    for _ in 0..branches {
        let (results_tx, results) = sink::bounded(capacity);
        pools.push(WorkerPool::start_shared(
            &config,
            queue.clone(),
            results_tx,
            Arc::clone(&transform),
        )?);
        streams.push(results);
    }

    Ok((
        FanOut {
            branches: pools,
            shutdown_token,
        },
        streams,
    ))
}
