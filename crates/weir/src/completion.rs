//! Completion tracking shared by pools and mergers.
//!
//! A [`Completion`] counts the writers of a [`ResultSink`] that have not
//! finished yet. Every writer holds a [`CompletionGuard`]; dropping the guard
//! (normal exit, early return or unwinding) decrements the counter, and the
//! guard that brings it to zero closes the sink. That transition happens
//! exactly once.

use crate::sink::ResultSink;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Lifecycle of a pool (or merger) as seen from its completion tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolState {
    /// Workers are being launched.
    Idle,
    /// `remaining` workers have not exited yet. The sink is open.
    Running { remaining: usize },
    /// Every worker exited and the sink is closed, but results are still
    /// buffered.
    Draining,
    /// The sink is closed and fully drained.
    Done,
}

pub(crate) struct Completion<R> {
    remaining: AtomicUsize,
    launched: AtomicBool,
    sink: ResultSink<R>,
}

impl<R> Completion<R> {
    /// Tracks `writers` pending writers of `sink`. With zero writers the sink
    /// is closed immediately.
    pub(crate) fn new(writers: usize, sink: ResultSink<R>) -> Arc<Self> {
        if writers == 0 {
            sink.close();
        }
        Arc::new(Self {
            remaining: AtomicUsize::new(writers),
            launched: AtomicBool::new(false),
            sink,
        })
    }

    /// Hands out a guard for one writer.
    pub(crate) fn guard(self: &Arc<Self>) -> CompletionGuard<R> {
        CompletionGuard {
            completion: Arc::clone(self),
        }
    }

    /// A writer handle onto the tracked sink.
    pub(crate) fn writer(&self) -> ResultSink<R> {
        self.sink.writer()
    }

    /// Marks the end of the launch phase.
    pub(crate) fn mark_launched(&self) {
        self.launched.store(true, Ordering::Release);
    }

    pub(crate) fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> PoolState {
        let remaining = self.remaining();
        if remaining > 0 {
            if self.launched.load(Ordering::Acquire) {
                PoolState::Running { remaining }
            } else {
                PoolState::Idle
            }
        } else if self.sink.is_empty() {
            PoolState::Done
        } else {
            PoolState::Draining
        }
    }

    /// Records one finished writer. Returns `true` for the call that closed
    /// the sink.
    fn arrive(&self) -> bool {
        let prev = self.remaining.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "completion counter underflow");

        if prev == 1 {
            let closed = self.sink.close();
            #[cfg(feature = "tracing")]
            tracing::debug!("Last writer finished, result sink closed");
            closed
        } else {
            false
        }
    }
}

/// Decrements the owning [`Completion`] when dropped.
pub(crate) struct CompletionGuard<R> {
    completion: Arc<Completion<R>>,
}

impl<R> Drop for CompletionGuard<R> {
    fn drop(&mut self) {
        self.completion.arrive();
    }
}
