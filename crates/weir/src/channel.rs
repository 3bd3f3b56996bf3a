//! Channel shared by task queues and result sinks.
//!
//! A non-zero capacity is a plain bounded `async_channel`. Capacity zero is a
//! handoff: every waiting consumer registers a oneshot slot, and a producer
//! only gives an item away by filling one of those slots. Nothing is accepted
//! while no consumer is waiting.

use crate::error::SendError;
use core::{
    fmt,
    pin::Pin,
    task::{Context, Poll, ready},
};
use futures::Stream;
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

type Slot<T> = oneshot::Sender<T>;

pub(crate) fn bounded<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let producers = Arc::new(AtomicUsize::new(1));
    if capacity == 0 {
        // Only holds items whose consumer gave up after its slot was filled.
        let (items_tx, items_rx) = async_channel::unbounded();
        let (slots_tx, slots_rx) = async_channel::unbounded();
        let tx = Sender {
            items: items_tx.clone(),
            slots: Some(slots_rx),
            producers,
        };
        let rx = Receiver {
            items: items_rx,
            handoff: Some(Handoff {
                slots: slots_tx,
                orphans: items_tx,
            }),
            pending: None,
        };
        (tx, rx)
    } else {
        let (items_tx, items_rx) = async_channel::bounded(capacity);
        let tx = Sender {
            items: items_tx,
            slots: None,
            producers,
        };
        let rx = Receiver {
            items: items_rx,
            handoff: None,
            pending: None,
        };
        (tx, rx)
    }
}

pub(crate) struct Sender<T> {
    items: async_channel::Sender<T>,
    slots: Option<async_channel::Receiver<Slot<T>>>,
    producers: Arc<AtomicUsize>,
}

impl<T> Sender<T> {
    /// Waits for room (or for a consumer, with a handoff) and sends. Hands
    /// the item back if every consumer has gone away.
    pub(crate) async fn send(&self, item: T) -> Result<(), T> {
        let Some(slots) = &self.slots else {
            return self
                .items
                .send(item)
                .await
                .map_err(|async_channel::SendError(item)| item);
        };

        let mut item = item;
        loop {
            let Ok(slot) = slots.recv().await else {
                return Err(item);
            };
            // A slot whose consumer stopped waiting returns the item.
            match slot.send(item) {
                Ok(()) => return Ok(()),
                Err(back) => item = back,
            }
        }
    }

    pub(crate) fn try_send(&self, item: T) -> Result<(), SendError<T>> {
        let Some(slots) = &self.slots else {
            return self.items.try_send(item).map_err(|e| match e {
                async_channel::TrySendError::Full(item) => SendError::Full(item),
                async_channel::TrySendError::Closed(item) => SendError::Disconnected(item),
            });
        };

        let mut item = item;
        loop {
            match slots.try_recv() {
                Ok(slot) => match slot.send(item) {
                    Ok(()) => return Ok(()),
                    Err(back) => item = back,
                },
                Err(async_channel::TryRecvError::Empty) => return Err(SendError::Full(item)),
                Err(async_channel::TryRecvError::Closed) => {
                    return Err(SendError::Disconnected(item));
                }
            }
        }
    }

    /// Closes the channel. Returns `true` only for the call that closed it.
    pub(crate) fn close(&self) -> bool {
        let Some(slots) = &self.slots else {
            return self.items.close();
        };
        let closed = slots.close();
        // Dropping the registered slots wakes every waiting consumer.
        while slots.try_recv().is_ok() {}
        closed
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.slots
            .as_ref()
            .map_or_else(|| self.items.is_closed(), async_channel::Receiver::is_closed)
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn capacity(&self) -> usize {
        if self.slots.is_some() {
            0
        } else {
            self.items.capacity().unwrap_or(usize::MAX)
        }
    }

    /// Number of live sending handles.
    pub(crate) fn handles(&self) -> usize {
        self.producers.load(Ordering::Acquire)
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.producers.fetch_add(1, Ordering::AcqRel);
        Self {
            items: self.items.clone(),
            slots: self.slots.clone(),
            producers: Arc::clone(&self.producers),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        if self.producers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.close();
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("handles", &self.handles())
            .finish_non_exhaustive()
    }
}

struct Handoff<T> {
    slots: async_channel::Sender<Slot<T>>,
    orphans: async_channel::Sender<T>,
}

impl<T> Clone for Handoff<T> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            orphans: self.orphans.clone(),
        }
    }
}

/// A registered slot. If its consumer stops waiting after a producer filled
/// it, the item goes back to the channel for the next receive.
struct Pending<T> {
    rx: oneshot::Receiver<T>,
    orphans: async_channel::Sender<T>,
}

impl<T> Drop for Pending<T> {
    fn drop(&mut self) {
        self.rx.close();
        if let Ok(item) = self.rx.try_recv() {
            let _ = self.orphans.try_send(item);
        }
    }
}

pin_project_lite::pin_project! {
    pub(crate) struct Receiver<T> {
        #[pin]
        items: async_channel::Receiver<T>,
        handoff: Option<Handoff<T>>,
        pending: Option<Pending<T>>,
    }
}

impl<T> Receiver<T> {
    pub(crate) async fn recv(&self) -> Option<T> {
        let Some(handoff) = &self.handoff else {
            return self.items.recv().await.ok();
        };
        if let Ok(item) = self.items.try_recv() {
            return Some(item);
        }

        let (slot, rx) = oneshot::channel();
        if handoff.slots.try_send(slot).is_err() {
            return self.items.try_recv().ok();
        }
        let mut pending = Pending {
            rx,
            orphans: handoff.orphans.clone(),
        };
        match (&mut pending.rx).await {
            Ok(item) => Some(item),
            Err(_) => self.items.try_recv().ok(),
        }
    }

    /// Takes an item that is already in the channel. With a handoff this
    /// never waits for a producer.
    pub(crate) fn try_recv(&self) -> Option<T> {
        self.items.try_recv().ok()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.handoff.as_ref().map_or_else(
            || self.items.is_closed(),
            |handoff| handoff.slots.is_closed(),
        )
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.is_closed() && self.items.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            handoff: self.handoff.clone(),
            pending: None,
        }
    }
}

impl<T> Stream for Receiver<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.project();
        let Some(handoff) = this.handoff.as_ref() else {
            return this.items.poll_next(cx);
        };

        if this.pending.is_none() {
            if let Ok(item) = this.items.try_recv() {
                return Poll::Ready(Some(item));
            }
            let (slot, rx) = oneshot::channel();
            if handoff.slots.try_send(slot).is_err() {
                return Poll::Ready(this.items.try_recv().ok());
            }
            *this.pending = Some(Pending {
                rx,
                orphans: handoff.orphans.clone(),
            });
        }

        let Some(pending) = this.pending.as_mut() else {
            return Poll::Ready(None);
        };
        let res = ready!(Pin::new(&mut pending.rx).poll(cx));
        *this.pending = None;
        Poll::Ready(res.ok().or_else(|| this.items.try_recv().ok()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("handoff", &self.handoff.is_some())
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
