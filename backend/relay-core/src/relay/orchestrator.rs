//! Owner of the live handler set.

use crate::bridge::Bridge;
use crate::relay::handler::{ConnectionHandler, HandlerState};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

/// Runs connection handlers and stops them in bulk.
///
/// # Thread Safety
///
/// This type is `Clone`; all clones share the same handler set.
#[derive(Clone)]
pub struct Orchestrator {
    bridge: Bridge,
    heartbeat: Duration,
    handlers: Arc<Mutex<HashMap<u64, Arc<AtomicBool>>>>,
    next_handler_id: Arc<AtomicU64>,
}

impl Orchestrator {
    pub fn new(bridge: Bridge, heartbeat: Duration) -> Self {
        Self {
            bridge,
            heartbeat,
            handlers: Arc::new(Mutex::new(HashMap::new())),
            next_handler_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Serve one accepted connection to completion, then close it.
    pub async fn handle<S>(&self, stream: S) -> HandlerState
    where
        S: AsyncRead + AsyncWrite,
    {
        let mut handler = ConnectionHandler::new(stream, self.bridge.clone(), self.heartbeat);
        let handler_id = self.next_handler_id.fetch_add(1, Ordering::SeqCst);

        self.handlers
            .lock()
            .await
            .insert(handler_id, handler.stop_flag());
        debug!("Handler {handler_id} started");

        let state = handler.run().await;

        self.handlers.lock().await.remove(&handler_id);
        handler.close().await;
        debug!("Handler {handler_id} finished in state {state:?}");

        state
    }

    /// Ask every live handler to stop at its next heartbeat.
    ///
    /// Returns how many handlers were signalled.
    pub async fn stop_all_handlers(&self) -> usize {
        let handlers = self.handlers.lock().await;
        for stop in handlers.values() {
            stop.store(true, Ordering::SeqCst);
        }
        handlers.len()
    }

    /// Retire every worker through the bridge and signal every handler.
    pub async fn shutdown(&self) {
        self.bridge.close_all().await;
        let signalled = self.stop_all_handlers().await;
        info!("Orchestrator shutdown signalled {signalled} handler(s)");
    }

    pub async fn live_handlers(&self) -> usize {
        self.handlers.lock().await.len()
    }
}
