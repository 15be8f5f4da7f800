//! Gateway entry point.
//!
//! Exit codes: 0 clean shutdown, 1 fatal startup failure, 2 unrecoverable
//! runtime error.

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use voxfab_gateway::server::GatewayRunError;
use voxfab_gateway::{GatewayConfig, run};

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; the environment always wins.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {e}");
            return ExitCode::from(1);
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                cancel.cancel();
            }
        }
    });

    match run(config, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ GatewayRunError::Startup(_)) => {
            error!("{e}");
            ExitCode::from(1)
        }
        Err(e @ GatewayRunError::Runtime(_)) => {
            error!("{e}");
            ExitCode::from(2)
        }
    }
}
