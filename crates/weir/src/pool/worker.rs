use crate::{
    completion::CompletionGuard,
    queue::TaskQueue,
    sink::ResultSink,
    transform::{ItemFailure, Transform, apply_caught},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a single worker did before it exited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    /// Items taken from the queue.
    pub received: u64,
    /// Results delivered to the sink.
    pub processed: u64,
    /// Results computed but never delivered, because the consumer went away
    /// or the pool was cancelled while the sink was full.
    pub dropped: u64,
    /// Items skipped because the transform failed.
    pub failures: Vec<ItemFailure>,
    /// `true` if the worker stopped because of the shutdown token rather than
    /// because the queue ran dry.
    pub cancelled: bool,
}

impl WorkerReport {
    const fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            received: 0,
            processed: 0,
            dropped: 0,
            failures: Vec::new(),
            cancelled: false,
        }
    }
}

/// Asynchronous task representing a single worker's lifecycle.
///
/// The worker pulls items from `queue`, applies `transform` and sends each
/// result to `sink`. It exits cleanly when either:
/// - the queue is closed and drained,
/// - the shutdown token is cancelled (checked between items, and while
///   waiting on a full sink),
/// - the consumer dropped the result stream.
///
/// A failing or panicking transform only skips that item. `_guard` is
/// released when this future finishes or is dropped, which is what
/// eventually closes the sink.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(worker_id = worker_id)))]
pub(crate) async fn worker_loop<T, X>(
    worker_id: usize,
    queue: TaskQueue<T>,
    sink: ResultSink<X::Output>,
    transform: Arc<X>,
    shutdown_token: CancellationToken,
    _guard: CompletionGuard<X::Output>,
) -> WorkerReport
where
    T: Send + 'static,
    X: Transform<T>,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    let mut report = WorkerReport::new(worker_id);

    loop {
        let item = tokio::select! {
            biased;
            () = shutdown_token.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {worker_id} shutdown via cancellation token");
                report.cancelled = true;
                break;
            }
            item = queue.recv() => match item {
                Some(item) => item,
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Worker {worker_id} queue drained");
                    break;
                }
            },
        };

        let item_index = report.received;
        report.received += 1;

        let output = match apply_caught(transform.as_ref(), item) {
            Ok(output) => output,
            Err(kind) => {
                let failure = ItemFailure {
                    worker_id,
                    item_index,
                    kind,
                };
                #[cfg(feature = "tracing")]
                tracing::warn!("Skipping item: {failure}");
                report.failures.push(failure);
                continue;
            }
        };

        // Prefer delivering a finished result; only give up on it if the sink
        // stays full after cancellation.
        tokio::select! {
            biased;
            res = sink.send(output) => {
                if res.is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Worker {worker_id} exiting, result stream dropped");
                    report.dropped += 1;
                    break;
                }
                report.processed += 1;
            }
            () = shutdown_token.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {worker_id} cancelled while waiting on a full sink");
                report.dropped += 1;
                report.cancelled = true;
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(
        "Worker {worker_id} stopped (received {}, processed {}, failed {})",
        report.received,
        report.processed,
        report.failures.len()
    );

    report
}
