use crate::relay_tests::helpers::{
    TEST_DEADLINE, TEST_WORKER_TOKEN, answer_next, authenticate, connect_worker,
    is_connection_closed, start_test_relay, wait_for_workers,
};

use relay_core::error::bridge::BridgeError;
use relay_core::message::WorkerIdentity;
use relay_core::relay::wire::{AuthResponse, INVALID_CODE};

use std::time::Duration;

use serde_json::json;

/// **VALUE**: Verifies a full request round trip over TCP.
///
/// **WHY THIS MATTERS**: This is the relay's whole purpose: a caller hands a
/// payload to the bridge and gets the worker's answer back.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The accept loop never spawns a handler
/// - Line framing breaks across a real socket
/// - Replies are not routed back to the waiting caller
#[tokio::test]
async fn given_authenticated_worker_when_bridge_requests_then_reply_round_trips() {
    // GIVEN: A running relay and an authenticated worker
    let handle = start_test_relay(Duration::from_millis(100)).await;
    let mut worker = connect_worker(handle.local_addr()).await;
    let auth = authenticate(&mut worker, TEST_WORKER_TOKEN).await;
    assert!(matches!(auth, AuthResponse::Success(_)), "Auth should succeed");

    // WHEN: A caller sends a request through the bridge
    let bridge = handle.bridge().clone();
    let caller = tokio::spawn(async move {
        bridge
            .request(&WorkerIdentity::new(TEST_WORKER_TOKEN), json!({ "sum": [1, 2] }))
            .await
    });
    let forwarded = answer_next(&mut worker, json!(3)).await;

    // THEN: Worker saw the payload and the caller got the answer
    assert_eq!(forwarded, json!({ "sum": [1, 2] }));
    let reply = tokio::time::timeout(TEST_DEADLINE, caller)
        .await
        .expect("Caller never released")
        .unwrap()
        .expect("Request should succeed");
    assert_eq!(reply, json!(3));

    handle.shutdown().await;
}

/// **VALUE**: Verifies that unknown tokens are refused over TCP.
///
/// **WHY THIS MATTERS**: The relay listens on a socket; only configured
/// workers may register.
///
/// **BUG THIS CATCHES**: Would catch accepting any token or leaving refused
/// connections open.
#[tokio::test]
async fn given_wrong_token_when_authenticating_then_refused_and_closed() {
    // GIVEN: A running relay
    let handle = start_test_relay(Duration::from_millis(100)).await;
    let mut worker = connect_worker(handle.local_addr()).await;

    // WHEN: Authenticating with a wrong token
    let auth = authenticate(&mut worker, "not-a-token").await;

    // THEN: Refused and disconnected
    assert_eq!(auth, AuthResponse::Error(INVALID_CODE.to_string()));
    assert!(is_connection_closed(&mut worker).await);
    assert!(handle.bridge().connected_workers().await.is_empty());

    handle.shutdown().await;
}

/// **VALUE**: Verifies that a worker crash surfaces to the waiting caller.
///
/// **WHY THIS MATTERS**: Callers must get a disconnect error, never hang.
///
/// **BUG THIS CATCHES**: Would catch lost cleanup when a TCP peer vanishes.
#[tokio::test]
async fn given_pending_request_when_worker_socket_drops_then_caller_gets_disconnect() {
    // GIVEN: An authenticated worker with a forwarded request
    let handle = start_test_relay(Duration::from_millis(50)).await;
    let mut worker = connect_worker(handle.local_addr()).await;
    authenticate(&mut worker, TEST_WORKER_TOKEN).await;
    let bridge = handle.bridge().clone();
    let caller = tokio::spawn(async move {
        bridge
            .request(&WorkerIdentity::new(TEST_WORKER_TOKEN), json!("work"))
            .await
    });
    tokio::time::timeout(TEST_DEADLINE, worker.read_message())
        .await
        .expect("No request forwarded")
        .unwrap();

    // WHEN: The worker drops its socket
    drop(worker);

    // THEN: The caller is released with ScriptDisconnected and the worker is gone
    let result = tokio::time::timeout(TEST_DEADLINE, caller)
        .await
        .expect("Caller never released")
        .unwrap();
    assert!(matches!(result, Err(BridgeError::ScriptDisconnected { .. })));
    wait_for_workers(handle.bridge(), 0).await;

    handle.shutdown().await;
}

/// **VALUE**: Verifies that shutdown closes worker connections.
///
/// **WHY THIS MATTERS**: Workers detect relay restarts through EOF.
///
/// **BUG THIS CATCHES**: Would catch shutdown that leaves sockets open.
#[tokio::test]
async fn given_connected_worker_when_relay_shuts_down_then_worker_sees_eof() {
    // GIVEN: A connected worker
    let handle = start_test_relay(Duration::from_secs(30)).await;
    let mut worker = connect_worker(handle.local_addr()).await;
    authenticate(&mut worker, TEST_WORKER_TOKEN).await;
    wait_for_workers(handle.bridge(), 1).await;

    // WHEN: Shutting down
    handle.shutdown().await;

    // THEN: The worker's connection is closed
    assert!(is_connection_closed(&mut worker).await);
}
