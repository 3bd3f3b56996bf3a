//! Bounded, closable multi-consumer task queue.
//!
//! [`bounded`] returns a [`Producer`] / [`TaskQueue`] pair. Producers push
//! work items; consumers (usually the workers of a
//! [`WorkerPool`](crate::WorkerPool)) pull them. Every item is delivered to
//! exactly one consumer.
//!
//! Closing is tied to ownership: [`Producer::close`] consumes the handle and
//! the queue closes once the last producer handle is closed or dropped. After
//! that, consumers drain whatever is still buffered and then observe the end
//! of the queue. Sending after close cannot be written.

use crate::{
    channel,
    error::{Error, Result, SendError},
};
use core::time::Duration;

/// Creates a bounded task queue holding at most `capacity` pending items.
///
/// A capacity of `0` buffers nothing: a send completes only by handing the
/// item to a consumer that is waiting for it, and [`Producer::try_send`]
/// fails unless one is.
pub fn bounded<T>(capacity: usize) -> (Producer<T>, TaskQueue<T>) {
    let (tx, rx) = channel::bounded(capacity);
    (Producer { tx }, TaskQueue { rx })
}

/// The sending half of a task queue.
///
/// Cloning a producer adds another handle that keeps the queue open.
#[derive(Debug)]
pub struct Producer<T> {
    tx: channel::Sender<T>,
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Producer<T> {
    /// Sends an item, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Disconnected`] with the item if every consumer has
    /// gone away.
    pub async fn send(&self, item: T) -> Result<(), SendError<T>> {
        self.tx.send(item).await.map_err(SendError::Disconnected)
    }

    /// Sends an item only if a slot is free right now. With capacity `0`,
    /// only if a consumer is waiting right now.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Full`] when no slot is available, or
    /// [`SendError::Disconnected`] when every consumer has gone away. Both
    /// carry the item.
    pub fn try_send(&self, item: T) -> Result<(), SendError<T>> {
        self.tx.try_send(item)
    }

    /// Sends an item, giving up once `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Timeout`] when the queue stayed full for the whole
    /// wait (the item is dropped), or [`SendError::Disconnected`] when every
    /// consumer has gone away.
    pub async fn send_timeout(&self, item: T, timeout: Duration) -> Result<(), SendError<T>> {
        match tokio::time::timeout(timeout, self.send(item)).await {
            Ok(res) => res,
            Err(_) => Err(SendError::Timeout(timeout)),
        }
    }

    /// Signals that this producer has no more items.
    ///
    /// The queue closes when the last producer handle is closed or dropped.
    pub fn close(self) {
        #[cfg(feature = "tracing")]
        tracing::trace!(
            "Producer closed ({} handles left)",
            self.tx.handles().saturating_sub(1)
        );
    }

    /// Returns `true` if the queue can no longer accept items.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Maximum number of buffered items. `0` for a handoff queue.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// The receiving half of a task queue.
///
/// Cloning creates another consumer. Consumers compete for items, so each
/// item is received by exactly one of them.
#[derive(Debug)]
pub struct TaskQueue<T> {
    rx: channel::Receiver<T>,
}

impl<T> Clone for TaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> TaskQueue<T> {
    pub(crate) const fn from_receiver(rx: channel::Receiver<T>) -> Self {
        Self { rx }
    }

    /// Receives the next item.
    ///
    /// Returns `None` once the queue is closed and every buffered item has
    /// been taken. It never blocks after that point.
    pub async fn recv(&self) -> Option<T> {
        self.rx.recv().await
    }

    /// Receives the next item, giving up once `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no item arrived and the queue did not
    /// close in time.
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| Error::Timeout(timeout))
    }

    /// Takes an item if one is buffered right now. A handoff queue buffers
    /// nothing, so this does not pair up with a waiting producer.
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv()
    }

    /// Returns `true` once every producer has closed. Buffered items may
    /// still be pending.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Returns `true` once the queue is closed and fully drained.
    pub fn is_terminated(&self) -> bool {
        self.rx.is_terminated()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drains_buffered_items_after_close() {
        let (producer, queue) = bounded(3);
        producer.send(1).await.unwrap();
        producer.send(2).await.unwrap();
        producer.send(3).await.unwrap();
        producer.close();

        assert!(queue.is_closed());
        assert!(!queue.is_terminated());
        assert_eq!(queue.recv().await, Some(1));
        assert_eq!(queue.recv().await, Some(2));
        assert_eq!(queue.recv().await, Some(3));
        assert_eq!(queue.recv().await, None);
        assert_eq!(queue.recv().await, None);
        assert!(queue.is_terminated());
    }

    #[tokio::test]
    async fn stays_open_until_last_producer_closes() {
        let (producer, queue) = bounded::<u32>(4);
        let other = producer.clone();

        producer.close();
        assert!(!queue.is_closed());

        other.send(9).await.unwrap();
        drop(other);
        assert!(queue.is_closed());
        assert_eq!(queue.recv().await, Some(9));
        assert_eq!(queue.recv().await, None);
    }

    #[tokio::test]
    async fn try_send_reports_full() {
        let (producer, queue) = bounded(1);
        producer.try_send('a').unwrap();

        let err = producer.try_send('b').unwrap_err();
        assert!(err.is_full());
        assert_eq!(err.into_inner(), Some('b'));

        assert_eq!(queue.try_recv(), Some('a'));
        assert_eq!(queue.try_recv(), None);
    }

    #[tokio::test]
    async fn send_fails_without_consumers() {
        let (producer, queue) = bounded(2);
        drop(queue);

        let err = producer.send("lost").await.unwrap_err();
        assert!(err.is_disconnected());
        assert_eq!(err.into_inner(), Some("lost"));
        assert!(producer.is_closed());
    }

    #[tokio::test]
    async fn zero_capacity_accepts_nothing_without_a_consumer() {
        let (producer, queue) = bounded::<u64>(0);
        assert_eq!(producer.capacity(), 0);

        let err = producer.try_send(42).unwrap_err();
        assert!(err.is_full());
        assert_eq!(err.into_inner(), Some(42));
        assert!(queue.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn zero_capacity_hands_items_to_waiting_consumers() {
        let (producer, queue) = bounded(0);
        let consumer = tokio::spawn(async move {
            let mut got = Vec::new();
            while let Some(item) = queue.recv().await {
                got.push(item);
            }
            got
        });

        producer.send(1).await.unwrap();
        let mut item = 2;
        // Succeeds once the consumer is back to waiting.
        while let Err(err) = producer.try_send(item) {
            assert!(err.is_full());
            item = err.into_inner().unwrap();
            tokio::task::yield_now().await;
        }
        producer.close();

        assert_eq!(consumer.await.unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_capacity_send_times_out_without_a_consumer() {
        let (producer, queue) = bounded(0);
        let err = producer
            .send_timeout(1, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, SendError::Timeout(Duration::from_millis(50)));
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn send_timeout_expires_on_full_queue() {
        let (producer, queue) = bounded(1);
        producer.send(1).await.unwrap();

        let err = producer
            .send_timeout(2, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err.into_inner(), None);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recv_timeout_expires_on_open_empty_queue() {
        let (producer, queue) = bounded::<u8>(1);

        let res = queue.recv_timeout(Duration::from_millis(100)).await;
        assert_eq!(res, Err(Error::Timeout(Duration::from_millis(100))));

        producer.close();
        assert_eq!(queue.recv_timeout(Duration::from_millis(100)).await, Ok(None));
    }

    #[tokio::test]
    async fn each_item_reaches_one_consumer() {
        let (producer, queue) = bounded(8);
        let other = queue.clone();

        for i in 0..8 {
            producer.send(i).await.unwrap();
        }
        producer.close();

        let mut seen = Vec::new();
        loop {
            match (queue.try_recv(), other.try_recv()) {
                (None, None) => break,
                (a, b) => seen.extend(a.into_iter().chain(b)),
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }
}
