//! Worker pool: `N` workers draining one task queue into one result sink.
//!
//! ## Structure
//!
//! - `config` - [`PoolConfig`], validated when the pool starts.
//! - `manager` - [`WorkerPool`] launch, cancellation, join and shutdown.
//! - `worker` - the worker loop and its [`WorkerReport`].

mod config;
mod manager;
mod worker;


pub use config::*;
pub use manager::*;
pub use worker::WorkerReport;
