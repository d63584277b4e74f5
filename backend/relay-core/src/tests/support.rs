// Shared fixtures for unit tests: in-memory worker connections over tokio duplex pipes

use crate::bridge::{Bridge, TokenStore};
use crate::relay::connection::PeerConnection;
use crate::relay::handler::{ConnectionHandler, HandlerState};
use crate::relay::wire::AuthResponse;

use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{DuplexStream, duplex};
use tokio::task::JoinHandle;

pub const PIPE_CAPACITY: usize = 64 * 1024;
pub const TEST_HEARTBEAT: Duration = Duration::from_millis(25);
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

pub type WorkerSide = PeerConnection<DuplexStream>;

pub fn bridge_with(tokens: &[&str]) -> Bridge {
    Bridge::new(TokenStore::new(tokens.iter().copied()))
}

/// Spawn a handler on one end of a pipe and return the worker's end.
pub fn spawn_handler(bridge: &Bridge, heartbeat: Duration) -> (JoinHandle<HandlerState>, WorkerSide) {
    let (server, client) = duplex(PIPE_CAPACITY);
    let bridge = bridge.clone();
    let task = tokio::spawn(async move {
        let mut handler = ConnectionHandler::new(server, bridge, heartbeat);
        handler.run().await
    });
    (task, PeerConnection::new(client))
}

/// Send an auth line and return the parsed response.
pub async fn send_auth(worker: &mut WorkerSide, message: Value) -> AuthResponse {
    worker
        .write_message(&message)
        .await
        .expect("Failed to send auth line");
    let response = worker
        .read_message()
        .await
        .expect("Failed to read auth response")
        .expect("Connection closed before auth response");
    serde_json::from_value(response).expect("Auth response has unexpected shape")
}

/// Spawn a handler and authenticate it with `token`; returns the assigned script name.
pub async fn authenticated_worker(
    bridge: &Bridge,
    token: &str,
    heartbeat: Duration,
) -> (JoinHandle<HandlerState>, WorkerSide, String) {
    let (task, mut worker) = spawn_handler(bridge, heartbeat);
    match send_auth(&mut worker, json!({ "auth_code": token })).await {
        AuthResponse::Success(name) => (task, worker, name),
        AuthResponse::Error(reason) => panic!("Expected auth success, got error: {reason}"),
    }
}

/// Wait for a handler task with a deadline so a hung handler fails the test.
pub async fn finished(task: JoinHandle<HandlerState>) -> HandlerState {
    tokio::time::timeout(TEST_DEADLINE, task)
        .await
        .expect("Handler did not finish in time")
        .expect("Handler task panicked")
}
