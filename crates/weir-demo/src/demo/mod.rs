//! Building blocks of the `weir-demo` binary.
//!
//! - [`config`] - CLI and environment configuration.
//! - [`scenarios`] - the walkthrough itself.
//! - [`telemetry`] - console logging.

pub mod config;
pub mod scenarios;
pub mod telemetry;
