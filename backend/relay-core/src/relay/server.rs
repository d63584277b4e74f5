//! TCP accept loop for worker connections.

use crate::bridge::Bridge;
use crate::config::RelayConfig;
use crate::error::relay::RelayError;
use crate::relay::handle::RelayServerHandle;
use crate::relay::orchestrator::Orchestrator;

use common::ErrorLocation;

use std::panic::Location;

use log::{debug, info, warn};
use tokio::net::TcpListener;
use tokio::spawn as TokioSpawn;

/// Bind `config.listen_address` and start accepting worker connections.
///
/// Each accepted connection gets its own task running
/// [`Orchestrator::handle`]. The accept loop itself runs in the background
/// until [`RelayServerHandle::shutdown`] is called.
///
/// # Errors
///
/// Returns [`RelayError::Bind`] if the address cannot be bound, or
/// [`RelayError::Io`] if the bound address cannot be read back.
pub async fn start_relay_server(
    config: &RelayConfig,
    bridge: Bridge,
) -> Result<RelayServerHandle, RelayError> {
    let listener = TcpListener::bind(&config.listen_address)
        .await
        .map_err(|e| RelayError::Bind {
            address: config.listen_address.clone(),
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;
    let local_addr = listener.local_addr()?;

    info!("Relay listening on {local_addr}");

    let orchestrator = Orchestrator::new(bridge, config.heartbeat_timeout());
    let accept_orchestrator = orchestrator.clone();

    let accept_task = TokioSpawn(async move {
        while let Ok((stream, addr)) = listener.accept().await {
            info!("Worker connecting from {addr}");
            let orchestrator = accept_orchestrator.clone();
            TokioSpawn(async move {
                let state = orchestrator.handle(stream).await;
                debug!("Connection from {addr} ended in state {state:?}");
            });
        }
        warn!("Relay accept loop stopped");
    });

    Ok(RelayServerHandle::new(local_addr, orchestrator, accept_task))
}
