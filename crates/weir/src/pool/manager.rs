//! Asynchronous worker pool coordinating a task queue and a result sink.
//!
//! This module defines the [`WorkerPool`] struct, which launches a fixed set
//! of Tokio tasks that share one [`TaskQueue`] and one [`ResultSink`]. Workers
//! compete for items on the queue, so every item is handled by exactly one
//! worker. Each worker holds a completion guard; the last guard to be released
//! closes the sink, so consumers see the result stream end exactly once, after
//! every worker has exited.
//!
//! Shutdown is cooperative and driven by a shared [`CancellationToken`].

use super::{
    config::PoolConfig,
    worker::{WorkerReport, worker_loop},
};
use crate::{
    completion::{Completion, PoolState},
    error::{Error, Result},
    queue::TaskQueue,
    sink::ResultSink,
    transform::{ItemFailure, Transform},
};
use core::time::Duration;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running set of workers draining a [`TaskQueue`] into a [`ResultSink`].
///
/// Dropping the pool does not stop the workers; they keep running until the
/// queue is drained or the shutdown token is cancelled.
pub struct WorkerPool<R> {
    handles: Vec<JoinHandle<WorkerReport>>,
    completion: Arc<Completion<R>>,
    shutdown_token: CancellationToken,
}

impl<R: Send + 'static> WorkerPool<R> {
    /// Validates `config` and launches `config.num_workers` workers.
    ///
    /// Each worker pulls from `queue`, applies `transform`, and sends results
    /// into `sink`. The sink is closed once all workers have exited.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is rejected. In
    /// that case no worker is spawned; the queue and sink handles are dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start<T, X>(
        config: &PoolConfig,
        queue: TaskQueue<T>,
        sink: ResultSink<R>,
        transform: X,
    ) -> Result<Self>
    where
        T: Send + 'static,
        X: Transform<T, Output = R>,
    {
        Self::start_shared(config, queue, sink, Arc::new(transform))
    }

    /// Same as [`start`](Self::start) with a transform already shared with
    /// other pools.
    pub(crate) fn start_shared<T, X>(
        config: &PoolConfig,
        queue: TaskQueue<T>,
        sink: ResultSink<R>,
        transform: Arc<X>,
    ) -> Result<Self>
    where
        T: Send + 'static,
        X: Transform<T, Output = R>,
    {
        config.validate()?;

        let completion = Completion::new(config.num_workers, sink);
        let mut handles = Vec::with_capacity(config.num_workers);

        for worker_id in 0..config.num_workers {
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                queue.clone(),
                completion.writer(),
                Arc::clone(&transform),
                config.shutdown_token.clone(),
                completion.guard(),
            )));
        }
        completion.mark_launched();

        #[cfg(feature = "tracing")]
        tracing::debug!("Worker pool started with {} workers", config.num_workers);

        Ok(Self {
            handles,
            completion,
            shutdown_token: config.shutdown_token.clone(),
        })
    }

    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }

    /// Number of workers that have not exited yet.
    pub fn remaining(&self) -> usize {
        self.completion.remaining()
    }

    pub fn state(&self) -> PoolState {
        self.completion.state()
    }

    /// Asks every worker to stop after its current item.
    ///
    /// Items still in the queue are left there. The sink closes once every
    /// worker has noticed.
    pub fn cancel(&self) {
        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling worker pool");
        self.shutdown_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Waits for every worker to exit and collects their reports.
    ///
    /// This does not close the queue; the producer must do that (or the pool
    /// must be cancelled), otherwise this waits forever.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerJoin`] for the first worker task that was
    /// aborted or panicked outside of item processing. Every other worker is
    /// still awaited first, so no task outlives the call, but their reports
    /// are discarded. The sink is closed regardless.
    pub async fn join(self) -> Result<PoolReport> {
        let mut workers = Vec::with_capacity(self.handles.len());
        let mut first_error = None;
        for (worker_id, handle) in self.handles.into_iter().enumerate() {
            match handle.await {
                Ok(report) => workers.push(report),
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {worker_id} failed to join: {e}");
                    if first_error.is_none() {
                        first_error = Some(Error::WorkerJoin {
                            worker_id,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Worker pool joined");

        Ok(PoolReport { workers })
    }

    /// Gracefully shuts the pool down.
    ///
    /// - Cancels the shutdown token so no worker takes a new item.
    /// - Waits up to `grace` for each worker to exit.
    /// - Aborts workers that did not exit in time. Their guards are released
    ///   on abort, so the sink still closes.
    ///
    /// Reports of aborted workers are missing from the returned report.
    pub async fn shutdown(self, grace: Duration) -> Result<PoolReport> {
        #[cfg(feature = "tracing")]
        tracing::info!("Initiating worker pool shutdown");
        self.shutdown_token.cancel();

        let mut workers = Vec::with_capacity(self.handles.len());
        for (_worker_id, mut handle) in self.handles.into_iter().enumerate() {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(report)) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Worker {_worker_id} shut down gracefully");
                    workers.push(report);
                }
                Ok(Err(_e)) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {_worker_id} returned error: {_e}");
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Worker {_worker_id} shutdown timed out, aborting");
                    handle.abort();
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete");

        Ok(PoolReport { workers })
    }
}

/// Reports of every worker of a pool, in worker id order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub workers: Vec<WorkerReport>,
}

impl PoolReport {
    /// Items taken from the queue across all workers.
    pub fn received(&self) -> u64 {
        self.workers.iter().map(|w| w.received).sum()
    }

    /// Results delivered to the sink across all workers.
    pub fn processed(&self) -> u64 {
        self.workers.iter().map(|w| w.processed).sum()
    }

    /// Results computed but never delivered.
    pub fn dropped(&self) -> u64 {
        self.workers.iter().map(|w| w.dropped).sum()
    }

    /// Number of items skipped because their transform failed.
    pub fn failed(&self) -> usize {
        self.workers.iter().map(|w| w.failures.len()).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemFailure> {
        self.workers.iter().flat_map(|w| w.failures.iter())
    }

    /// `true` if any worker stopped because of cancellation.
    pub fn was_cancelled(&self) -> bool {
        self.workers.iter().any(|w| w.cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{queue, sink, transform};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn join_waits_for_every_worker_before_reporting_a_failure() {
        let (producer, tasks) = queue::bounded::<u32>(4);
        let (results_tx, results) = sink::bounded(4);
        let pool = WorkerPool::start(
            &PoolConfig::new(2),
            tasks,
            results_tx,
            transform::from_fn(|n: u32| n),
        )
        .unwrap();

        pool.handles[0].abort();
        let join = tokio::spawn(pool.join());

        // Worker 1 is still waiting on the open queue.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!join.is_finished());

        producer.close();
        let err = join.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::WorkerJoin { worker_id: 0, .. }));
        assert!(results.is_closed());
    }
}
