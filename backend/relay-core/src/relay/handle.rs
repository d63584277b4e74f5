//! Handle returned by [`start_relay_server`](crate::relay::start_relay_server).

use crate::bridge::Bridge;
use crate::relay::orchestrator::Orchestrator;

use std::net::SocketAddr;

use log::info;
use tokio::task::JoinHandle;

/// Handle to a running relay.
///
/// Dropping the handle does not stop the server; call
/// [`shutdown`](Self::shutdown).
pub struct RelayServerHandle {
    local_addr: SocketAddr,
    orchestrator: Orchestrator,
    accept_task: JoinHandle<()>,
}

impl RelayServerHandle {
    pub(crate) fn new(
        local_addr: SocketAddr,
        orchestrator: Orchestrator,
        accept_task: JoinHandle<()>,
    ) -> Self {
        Self {
            local_addr,
            orchestrator,
            accept_task,
        }
    }

    /// Address actually bound (resolves port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// The bridge callers use to reach connected workers.
    pub fn bridge(&self) -> &Bridge {
        self.orchestrator.bridge()
    }

    /// Stop accepting, retire every worker and signal every handler.
    pub async fn shutdown(self) {
        self.accept_task.abort();
        self.orchestrator.shutdown().await;
        info!("Relay on {} shut down", self.local_addr);
    }
}
