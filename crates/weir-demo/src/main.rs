#![doc = include_str!("../README.md")]

mod demo;

use clap::Parser;
use demo::config::{CliArgs, DemoConfig};
use demo::scenarios;
use demo::telemetry::init_telemetry;
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = DemoConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let shutdown_token = CancellationToken::new();
    let mut demo = tokio::spawn(scenarios::run(config.clone(), shutdown_token.clone()));

    tokio::select! {
        res = &mut demo => return res?,
        () = shutdown_signal() => {}
    }

    tracing::info!("Shutdown signal received, cancelling running scenario...");
    shutdown_token.cancel();

    match tokio::time::timeout(config.shutdown_timeout, &mut demo).await {
        Ok(res) => {
            res??;
            tracing::info!("Demo shut down successfully");
            Ok(())
        }
        Err(_) => {
            demo.abort();
            anyhow::bail!(
                "scenario did not stop within {:?} of the shutdown signal",
                config.shutdown_timeout
            )
        }
    }
}

fn log_startup_info(config: &DemoConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting weir demo with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting weir demo ({:?}) with {} workers",
            config.scenario,
            config.num_workers
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
