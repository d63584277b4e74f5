use relayd::error::RelaydError;
use relayd::logger::initialize as LoggerInitialize;

use relay_core::bridge::Bridge;
use relay_core::config::{RelayConfig, config_dir};
use relay_core::relay::start_relay_server;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::process::ExitCode;

use log::{error, info};

const LOG_DIR_NAME: &str = "logs";

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("relayd: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), RelaydError> {
    let config_dir = config_dir()?;
    let log_dir = config_dir.join(LOG_DIR_NAME);

    create_dir_all(&log_dir).map_err(|e| RelaydError::Relayd {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir)?;

    info!("Worker relay starting");
    info!("Config directory: {}", config_dir.display());

    let config = RelayConfig::load_with_env(&config_dir)?;
    let bridge = Bridge::new(config.token_store());

    info!(
        "Accepting {} worker token(s), heartbeat {}ms",
        bridge.token_count(),
        config.heartbeat_timeout_ms
    );

    let handle = start_relay_server(&config, bridge).await?;
    info!("Relay ready on {}", handle.local_addr());

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| RelaydError::Relayd {
            message: format!("Failed to listen for shutdown signal: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    info!("Shutdown signal received");
    handle.shutdown().await;

    Ok(())
}
