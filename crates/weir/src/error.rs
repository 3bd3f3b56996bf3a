//! Error types for worker pools, queues and result streams.
//!
//! ## Error Cases
//! - `InvalidConfig`: A pool or fan-out was started with an unusable
//!   configuration (e.g. zero workers). Nothing is spawned.
//! - `Timeout`: A bounded wait on a queue or stream expired.
//! - `WorkerJoin`: A worker task could not be joined (it was aborted or
//!   panicked outside of item processing).
//!
//! Sending into a [`TaskQueue`](crate::TaskQueue) has its own error,
//! [`SendError`], which hands the rejected item back to the caller.

use core::fmt;
use core::time::Duration;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for pool coordination.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The pool configuration was rejected before any worker was spawned.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A bounded wait expired before the operation could complete.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// A worker task ended without producing its report.
    #[error("Worker {worker_id} could not be joined: {reason}")]
    WorkerJoin { worker_id: usize, reason: String },
}

/// Failure to push an item into a [`TaskQueue`](crate::TaskQueue).
///
/// The item is returned whenever the queue still owned it at the time of the
/// failure, see [`SendError::into_inner`].
#[derive(Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError<T> {
    /// The queue is full and the caller asked not to wait.
    #[error("queue is full")]
    Full(T),

    /// Every consumer of the queue is gone; the item can never be delivered.
    #[error("queue has no remaining consumers")]
    Disconnected(T),

    /// The queue stayed full for the whole wait. The pending item is dropped
    /// together with the abandoned send.
    #[error("timed out after {0:?} waiting for queue capacity")]
    Timeout(Duration),
}

impl<T> SendError<T> {
    /// Recovers the rejected item, if the error still carries it.
    pub fn into_inner(self) -> Option<T> {
        match self {
            Self::Full(item) | Self::Disconnected(item) => Some(item),
            Self::Timeout(_) => None,
        }
    }

    pub const fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }

    pub const fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}

// Items are opaque, so `Debug` must not require `T: Debug`.
impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Disconnected(_) => f.write_str("Disconnected(..)"),
            Self::Timeout(dur) => f.debug_tuple("Timeout").field(dur).finish(),
        }
    }
}
