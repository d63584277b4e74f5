//! Test helpers for relay integration tests.
//!
//! This module provides utilities for testing the relay over real TCP:
//! - Starting a relay on an ephemeral port
//! - Connecting and authenticating workers
//! - Answering forwarded requests

use relay_core::bridge::Bridge;
use relay_core::config::RelayConfig;
use relay_core::relay::wire::AuthResponse;
use relay_core::relay::{PeerConnection, RelayServerHandle, start_relay_server};

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpStream;

/// Test constants for authentication
pub const TEST_WORKER_TOKEN: &str = "worker-token-12345";
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

pub type TestWorker = PeerConnection<TcpStream>;

/// Test helper: Start a relay on `127.0.0.1:0` accepting `TEST_WORKER_TOKEN`.
pub async fn start_test_relay(heartbeat: Duration) -> RelayServerHandle {
    let config = RelayConfig {
        listen_address: String::from("127.0.0.1:0"),
        heartbeat_timeout_ms: u64::try_from(heartbeat.as_millis()).expect("Heartbeat too large"),
        worker_tokens: vec![String::from(TEST_WORKER_TOKEN)],
        ..RelayConfig::default()
    };
    let bridge = Bridge::new(config.token_store());
    start_relay_server(&config, bridge)
        .await
        .expect("Failed to start relay")
}

/// Test helper: Connect a worker to the relay.
pub async fn connect_worker(addr: SocketAddr) -> TestWorker {
    let stream = TcpStream::connect(addr)
        .await
        .expect("Failed to connect to relay");
    PeerConnection::new(stream)
}

/// Test helper: Send the auth line and return the response.
pub async fn authenticate(worker: &mut TestWorker, token: &str) -> AuthResponse {
    worker
        .write_message(&json!({ "auth_code": token }))
        .await
        .expect("Failed to send auth line");
    let response = tokio::time::timeout(TEST_DEADLINE, worker.read_message())
        .await
        .expect("No auth response")
        .expect("Failed to read auth response")
        .expect("Relay closed before auth response");
    serde_json::from_value(response).expect("Unexpected auth response shape")
}

/// Test helper: Read one forwarded request and answer it with `data`.
///
/// Returns the request's `data` field.
pub async fn answer_next(worker: &mut TestWorker, data: Value) -> Value {
    let request = tokio::time::timeout(TEST_DEADLINE, worker.read_message())
        .await
        .expect("No request forwarded")
        .expect("Failed to read request")
        .expect("Relay closed before forwarding a request");
    worker
        .write_message(&json!({ "client_id": request["client_id"], "data": data }))
        .await
        .expect("Failed to send reply");
    request["data"].clone()
}

/// Test helper: Check if the relay has closed this worker's connection.
pub async fn is_connection_closed(worker: &mut TestWorker) -> bool {
    match tokio::time::timeout(TEST_DEADLINE, worker.read_message()).await {
        Err(_) => false,
        Ok(Ok(None)) => true,
        Ok(Ok(Some(_))) => false,
        Ok(Err(_)) => true,
    }
}

/// Test helper: Wait until `bridge` reports `expected` registered workers.
pub async fn wait_for_workers(bridge: &Bridge, expected: usize) {
    tokio::time::timeout(TEST_DEADLINE, async {
        while bridge.connected_workers().await.len() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Worker registry never reached the expected size");
}

