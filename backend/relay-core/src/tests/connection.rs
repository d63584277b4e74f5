// Unit tests for PeerConnection line framing

use crate::error::handler::HandlerError;
use crate::relay::connection::{PeerConnection, PeerStatus};

use serde_json::json;
use tokio::io::{AsyncWriteExt, duplex};

/// **VALUE**: Verifies that a JSON line written on one end is read intact on the other.
///
/// **WHY THIS MATTERS**: Every exchange with a worker is one line each way.
///
/// **BUG THIS CATCHES**: Would catch a missing newline or a missing flush.
#[tokio::test]
async fn given_message_written_when_read_then_same_value() {
    // GIVEN: Two connected ends
    let (left, right) = duplex(1024);
    let mut writer = PeerConnection::new(left);
    let mut reader = PeerConnection::new(right);

    // WHEN: Writing then reading a message
    writer
        .write_message(&json!({ "client_id": "c", "data": [1, 2] }))
        .await
        .unwrap();
    let read = reader.read_message().await.unwrap();

    // THEN: The value survives
    assert_eq!(read, Some(json!({ "client_id": "c", "data": [1, 2] })));
}

/// **VALUE**: Verifies that a non-JSON line is a JSON error, not EOF.
///
/// **WHY THIS MATTERS**: Malformed lines are fatal for the connection and must
/// be reported as such.
///
/// **BUG THIS CATCHES**: Would catch swallowing parse failures as `None`.
#[tokio::test]
async fn given_malformed_line_when_read_then_json_error() {
    // GIVEN: A peer that sends garbage
    let (mut raw, right) = duplex(1024);
    let mut reader = PeerConnection::new(right);
    raw.write_all(b"not json\n").await.unwrap();

    // WHEN: Reading
    let result = reader.read_message().await;

    // THEN: JSON error
    assert!(matches!(result, Err(HandlerError::Json { .. })));
}

/// **VALUE**: Verifies EOF detection for both the blocking read and the status peek.
///
/// **WHY THIS MATTERS**: The heartbeat liveness check depends on `peek_status`
/// telling "quiet" apart from "gone".
///
/// **BUG THIS CATCHES**: Would catch a status peek that reports idle peers as closed.
#[tokio::test]
async fn given_peer_open_then_closed_when_peeked_then_only_closed_is_reported() {
    // GIVEN: An open but silent peer
    let (left, right) = duplex(1024);
    let mut reader = PeerConnection::new(right);

    // WHEN/THEN: Probing an idle peer reports open
    assert_eq!(reader.peek_status(), PeerStatus::Idle, "Idle peer should not look closed");

    // WHEN/THEN: After the peer drops, the peek and read both see EOF
    drop(left);
    assert_eq!(reader.peek_status(), PeerStatus::Closed, "Dropped peer should look closed");
    assert_eq!(reader.read_message().await.unwrap(), None);
}

/// **VALUE**: Verifies that buffered data is reported as unsolicited and left in place.
///
/// **WHY THIS MATTERS**: A buffered line hides EOF from `fill_buf`, so the
/// handler must be told about it rather than see "open" forever.
///
/// **BUG THIS CATCHES**: Would catch a status peek that reports buffered data as
/// idle, or one that consumes the bytes.
#[tokio::test]
async fn given_buffered_line_when_peeked_then_unsolicited_and_line_still_readable() {
    // GIVEN: A peer that has already sent a line
    let (mut raw, right) = duplex(1024);
    let mut reader = PeerConnection::new(right);
    raw.write_all(b"{\"k\":1}\n").await.unwrap();
    tokio::task::yield_now().await;

    // WHEN: Probing
    let status = reader.peek_status();

    // THEN: Reported as unsolicited, and the line is intact
    assert_eq!(status, PeerStatus::Unsolicited);
    assert_eq!(reader.read_message().await.unwrap(), Some(json!({ "k": 1 })));
}

/// **VALUE**: Verifies that a stray line followed by a hang-up is still seen.
///
/// **WHY THIS MATTERS**: A worker that writes one unexpected line and then
/// dies must not look alive on every later heartbeat.
///
/// **BUG THIS CATCHES**: Would catch treating "bytes buffered" as "connected".
#[tokio::test]
async fn given_stray_line_then_eof_when_peeked_then_never_idle() {
    // GIVEN: A peer that sends a line and closes
    let (mut raw, right) = duplex(1024);
    let mut reader = PeerConnection::new(right);
    raw.write_all(b"{\"stray\":true}\n").await.unwrap();
    drop(raw);

    // WHEN/THEN: The first peek flags the stray line
    assert_eq!(reader.peek_status(), PeerStatus::Unsolicited);

    // WHEN/THEN: Once the line is consumed, EOF is visible
    assert_eq!(reader.read_message().await.unwrap(), Some(json!({ "stray": true })));
    assert_eq!(reader.peek_status(), PeerStatus::Closed);
}
