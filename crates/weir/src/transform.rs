//! The per-item work a pool applies, and how its failures are recorded.

use core::{convert::Infallible, fmt};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Turns one work item into one result.
///
/// Any `Fn(T) -> Result<R, E>` closure is a transform. Use [`from_fn`] for
/// closures that cannot fail.
///
/// A transform is shared by every worker of a pool, so it must be
/// `Send + Sync`. Shared mutable state it needs is its own business and must
/// use its own synchronization.
pub trait Transform<T>: Send + Sync + 'static {
    type Output: Send + 'static;
    type Error: fmt::Display;

    fn apply(&self, item: T) -> Result<Self::Output, Self::Error>;
}

impl<T, R, E, F> Transform<T> for F
where
    F: Fn(T) -> Result<R, E> + Send + Sync + 'static,
    R: Send + 'static,
    E: fmt::Display,
{
    type Output = R;
    type Error = E;

    fn apply(&self, item: T) -> Result<R, E> {
        self(item)
    }
}

/// Wraps an infallible closure as a [`Transform`].
pub const fn from_fn<F>(f: F) -> FromFn<F> {
    FromFn { f }
}

/// Transform returned by [`from_fn`].
#[derive(Clone, Copy, Debug)]
pub struct FromFn<F> {
    f: F,
}

impl<T, R, F> Transform<T> for FromFn<F>
where
    F: Fn(T) -> R + Send + Sync + 'static,
    R: Send + 'static,
{
    type Output = R;
    type Error = Infallible;

    fn apply(&self, item: T) -> Result<R, Infallible> {
        Ok((self.f)(item))
    }
}

/// Why a single item produced no result.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The transform returned an error.
    Error(String),
    /// The transform panicked.
    Panicked(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(msg) => write!(f, "error: {msg}"),
            Self::Panicked(msg) => write!(f, "panic: {msg}"),
        }
    }
}

/// A skipped item, as recorded by the worker that received it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ItemFailure {
    pub worker_id: usize,
    /// Position of the item among those received by this worker, from `0`.
    pub item_index: u64,
    pub kind: FailureKind,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "worker {} item #{}: {}",
            self.worker_id, self.item_index, self.kind
        )
    }
}

/// Applies `transform`, converting both errors and panics into a
/// [`FailureKind`].
pub(crate) fn apply_caught<T, X>(transform: &X, item: T) -> Result<X::Output, FailureKind>
where
    X: Transform<T>,
{
    match catch_unwind(AssertUnwindSafe(|| transform.apply(item))) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(FailureKind::Error(e.to_string())),
        Err(payload) => Err(FailureKind::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn core::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<u32, core::num::ParseIntError> {
        s.parse()
    }

    #[test]
    fn closures_are_transforms() {
        let t = |s: &'static str| parse(s);
        assert_eq!(apply_caught(&t, "12"), Ok(12));
        assert!(matches!(
            apply_caught(&t, "twelve"),
            Err(FailureKind::Error(msg)) if msg.contains("invalid digit")
        ));
    }

    #[test]
    fn from_fn_never_fails() {
        let t = from_fn(|n: i64| n * n);
        assert_eq!(apply_caught(&t, -4), Ok(16));
    }

    #[test]
    fn panics_become_failures() {
        let t = from_fn(|n: u32| {
            if n == 3 {
                panic!("three is not allowed");
            }
            n
        });
        assert_eq!(apply_caught(&t, 1), Ok(1));
        assert_eq!(
            apply_caught(&t, 3),
            Err(FailureKind::Panicked("three is not allowed".to_string()))
        );

        let t = from_fn(|n: u32| -> u32 { panic!("bad item {n}") });
        assert_eq!(
            apply_caught(&t, 9),
            Err(FailureKind::Panicked("bad item 9".to_string()))
        );
    }

    #[test]
    fn failure_display() {
        let failure = ItemFailure {
            worker_id: 2,
            item_index: 5,
            kind: FailureKind::Error("boom".into()),
        };
        assert_eq!(failure.to_string(), "worker 2 item #5: error: boom");
    }
}
