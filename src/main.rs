//! Service runtime entry point.
//!
//! ```text
//! load config → init logging → build supervisor → start
//!     first listener exit  → stop everything → exit (non-zero on error)
//!     SIGINT / SIGTERM     → graceful stop, bounded by the grace period
//!         deadline or a second signal → immediate stop
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use clap::Parser;

use service_runtime::config::load_config;
use service_runtime::lifecycle::signals::wait_for_signal;
use service_runtime::observability::init_logging;
use service_runtime::{ManagedServer, ServerError, Supervisor};

#[derive(Parser)]
#[command(name = "service-runtime")]
#[command(about = "Run a service's listeners as one process", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "service-runtime exiting with error");
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    init_logging(&config.library.log)?;

    tracing::info!(
        service = %config.name,
        version = env!("CARGO_PKG_VERSION"),
        admin = config.admin.is_some(),
        public_rest = config.public_rest.is_some(),
        public_grpc = config.public_grpc.is_some(),
        "service-runtime starting"
    );

    let grace_period = Duration::from_secs(config.shutdown.grace_period_secs);
    let public = Router::new().route("/ping", get(|| async { "pong" }));
    let supervisor = Arc::new(Supervisor::builder(config).public_routes(public).build()?);

    let runner = Arc::clone(&supervisor);
    let mut serving = tokio::spawn(async move { runner.start().await });

    tokio::select! {
        joined = &mut serving => {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => Err(ServerError::other(err)),
            };
            match &outcome {
                Ok(()) => tracing::warn!("A listener exited, stopping remaining servers"),
                Err(err) => tracing::error!(error = %err, "A listener failed, stopping remaining servers"),
            }
            if let Err(err) = supervisor.stop().await {
                tracing::error!(error = %err, "Error while stopping remaining servers");
            }
            outcome?;
        }
        signal = wait_for_signal() => {
            signal?;
            shut_down(&supervisor, grace_period).await?;
            // Listener exits during shutdown are expected.
            let _ = serving.await;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shut_down(supervisor: &Supervisor, grace_period: Duration) -> Result<(), ServerError> {
    tracing::info!(grace_period_secs = grace_period.as_secs(), "Graceful shutdown started");

    tokio::select! {
        drained = tokio::time::timeout(grace_period, supervisor.graceful_stop()) => match drained {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Grace period elapsed, forcing stop");
                supervisor.stop().await
            }
        },
        signal = wait_for_signal() => {
            tracing::warn!(signal = ?signal.ok(), "Second signal received, forcing stop");
            supervisor.stop().await
        }
    }
}
