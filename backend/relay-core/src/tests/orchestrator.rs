// Unit tests for Orchestrator handler bookkeeping and shutdown

use crate::relay::connection::PeerConnection;
use crate::relay::handler::HandlerState;
use crate::relay::orchestrator::Orchestrator;
use crate::relay::wire::AuthResponse;
use crate::tests::support::{
    PIPE_CAPACITY, TEST_DEADLINE, TEST_HEARTBEAT, WorkerSide, bridge_with, send_auth,
};

use std::time::Duration;

use serde_json::json;
use tokio::io::duplex;
use tokio::task::JoinHandle;

/// Start a handler through the orchestrator and authenticate it.
async fn orchestrated_worker(
    orchestrator: &Orchestrator,
    token: &str,
) -> (JoinHandle<HandlerState>, WorkerSide) {
    let (server, client) = duplex(PIPE_CAPACITY);
    let task = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.handle(server).await })
    };
    let mut worker = PeerConnection::new(client);
    let response = send_auth(&mut worker, json!({ "auth_code": token })).await;
    assert!(matches!(response, AuthResponse::Success(_)));
    (task, worker)
}

async fn wait_for_live(orchestrator: &Orchestrator, expected: usize) {
    tokio::time::timeout(TEST_DEADLINE, async {
        while orchestrator.live_handlers().await != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Live handler count never settled");
}

/// **VALUE**: Verifies that stopping all handlers ends every live connection.
///
/// **WHY THIS MATTERS**: Shutdown relies on the stop flags reaching every
/// handler the orchestrator started.
///
/// **BUG THIS CATCHES**: Would catch handlers missing from the live set, or
/// finished handlers lingering in it.
#[tokio::test]
async fn given_two_live_handlers_when_stop_all_then_both_terminate_and_set_empties() {
    // GIVEN: Two authenticated workers behind one orchestrator
    let orchestrator = Orchestrator::new(bridge_with(&["a", "b"]), TEST_HEARTBEAT);
    let (task_a, _worker_a) = orchestrated_worker(&orchestrator, "a").await;
    let (task_b, _worker_b) = orchestrated_worker(&orchestrator, "b").await;
    assert_eq!(orchestrator.live_handlers().await, 2);

    // WHEN: Stopping all handlers
    let signalled = orchestrator.stop_all_handlers().await;

    // THEN: Both were signalled and both finish
    assert_eq!(signalled, 2);
    for task in [task_a, task_b] {
        let state = tokio::time::timeout(TEST_DEADLINE, task)
            .await
            .expect("Handler did not stop")
            .unwrap();
        assert_eq!(state, HandlerState::Terminated);
    }
    wait_for_live(&orchestrator, 0).await;
    assert!(orchestrator.bridge().connected_workers().await.is_empty());
}

/// **VALUE**: Verifies that shutdown closes connections and empties the registry.
///
/// **WHY THIS MATTERS**: After shutdown no request may be routed to a worker
/// that is about to disappear.
///
/// **BUG THIS CATCHES**: Would catch shutdown that stops handlers but leaves
/// stale registry entries, or leaves transports open.
#[tokio::test]
async fn given_connected_worker_when_shutdown_then_registry_empty_and_connection_closed() {
    // GIVEN: A connected worker with a long heartbeat
    let orchestrator = Orchestrator::new(bridge_with(&["a"]), Duration::from_secs(30));
    let (task, mut worker) = orchestrated_worker(&orchestrator, "a").await;

    // WHEN: Shutting down
    orchestrator.shutdown().await;

    // THEN: Registry empty, handler done, worker sees EOF
    assert!(orchestrator.bridge().connected_workers().await.is_empty());
    let state = tokio::time::timeout(TEST_DEADLINE, task)
        .await
        .expect("Handler did not stop")
        .unwrap();
    assert_eq!(state, HandlerState::Terminated);
    assert_eq!(worker.read_message().await.unwrap(), None);
    wait_for_live(&orchestrator, 0).await;
}
