#![doc = include_str!("../README.md")]

mod channel;
mod completion;
mod error;
mod merge;
pub mod pipeline;
mod pool;
pub mod queue;
pub mod sink;
pub mod transform;

pub use crate::completion::PoolState;
pub use crate::error::*;
pub use crate::merge::*;
pub use crate::pipeline::{FanOut, fan_out, stage};
pub use crate::pool::*;
pub use crate::queue::{Producer, TaskQueue};
pub use crate::sink::{ResultSink, ResultStream};
pub use crate::transform::{FailureKind, FromFn, ItemFailure, Transform};
