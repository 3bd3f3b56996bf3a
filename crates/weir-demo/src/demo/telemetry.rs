//! Console logging for the demo.
//!
//! Events from `weir` (worker lifecycle, skipped items, shutdown) and from the
//! demo itself go through `tracing` and are printed to stderr by
//! `tracing_subscriber::fmt`. Scenario output goes to stdout, so the two can be
//! separated:
//!
//! ```bash
//! RUST_LOG=weir=trace cargo run -p weir-demo 2>weir.log
//! ```
//!
//! The filter is read from `RUST_LOG` and defaults to `info`.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        )
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installs_the_global_subscriber_once() {
        init_telemetry().unwrap();
        assert!(init_telemetry().is_err());
    }
}
