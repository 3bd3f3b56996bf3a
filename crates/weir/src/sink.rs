//! Result sink and the stream consumers read it from.
//!
//! A [`ResultSink`] is handed to a [`WorkerPool`](crate::WorkerPool) (or is
//! created internally by [`merge`](crate::merge)). The owner of the sink
//! closes it once all of its writers are done; consumers read the matching
//! [`ResultStream`] until it ends.

use crate::{
    channel,
    error::{Error, Result},
    queue::TaskQueue,
};
use core::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use futures::Stream;

/// Creates a bounded result sink holding at most `capacity` undelivered
/// results. With a capacity of `0` a writer waits until a reader takes the
/// result.
pub fn bounded<R>(capacity: usize) -> (ResultSink<R>, ResultStream<R>) {
    let (tx, rx) = channel::bounded(capacity);
    (ResultSink { tx }, ResultStream { rx })
}

/// Write side of a result stream.
///
/// Only the crate writes to a sink: workers and merge forwarders send into
/// it, and the completion tracker that owns it closes it.
#[derive(Debug)]
pub struct ResultSink<R> {
    tx: channel::Sender<R>,
}

impl<R> ResultSink<R> {
    pub(crate) fn writer(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }

    /// Sends a result, waiting while the sink is full. Hands the result back
    /// if the consumer has gone away.
    pub(crate) async fn send(&self, result: R) -> core::result::Result<(), R> {
        self.tx.send(result).await
    }

    /// Closes the sink. Returns `true` only for the call that actually closed
    /// it.
    pub(crate) fn close(&self) -> bool {
        self.tx.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Number of results waiting to be consumed.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

pin_project_lite::pin_project! {
    /// Read side of a result sink.
    ///
    /// Implements [`Stream`], so the usual `StreamExt` combinators apply. The
    /// stream ends once the sink is closed and every buffered result has been
    /// read.
    #[derive(Debug)]
    pub struct ResultStream<R> {
        #[pin]
        rx: channel::Receiver<R>,
    }
}

impl<R> ResultStream<R> {
    /// Receives the next result, or `None` once the stream has ended.
    pub async fn recv(&self) -> Option<R> {
        self.rx.recv().await
    }

    /// Receives the next result, giving up once `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if nothing arrived and the stream did not end
    /// in time.
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<Option<R>> {
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| Error::Timeout(timeout))
    }

    /// Takes a result if one is buffered right now.
    pub fn try_recv(&self) -> Option<R> {
        self.rx.try_recv()
    }

    /// Returns `true` once the sink has been closed. Buffered results may
    /// still be pending.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Returns `true` once the sink is closed and every result was read.
    pub fn is_terminated(&self) -> bool {
        self.rx.is_terminated()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Turns this stream into the task queue of a following stage.
    ///
    /// The queue closes when this stream's sink closes, so the downstream
    /// pool finishes right after the upstream one.
    pub fn into_queue(self) -> TaskQueue<R> {
        TaskQueue::from_receiver(self.rx)
    }
}

impl<R> Stream for ResultStream<R> {
    type Item = R;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<R>> {
        self.project().rx.poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rx.size_hint()
    }
}
