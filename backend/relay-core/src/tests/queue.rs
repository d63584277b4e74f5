// Unit tests for MessageQueue
// Focus on FIFO delivery, suspension while empty, and handle liveness

use crate::message::{ClientId, DataMessage, Message, WorkerIdentity};
use crate::queue::MessageQueue;

use std::time::Duration;

use serde_json::json;

fn data(client: &str) -> Message {
    Message::Data(DataMessage {
        client_id: ClientId::from(client),
        recipient_id: WorkerIdentity::new("worker"),
        payload: json!({ "client": client }),
    })
}

/// **VALUE**: Verifies that messages come out in the order they went in.
///
/// **WHY THIS MATTERS**: Requests to one worker must reach it in enqueue order.
/// Reordering would break any worker that depends on request sequencing.
///
/// **BUG THIS CATCHES**: Would catch a swap to a LIFO structure or a
/// priority scheme that lets control messages overtake data.
#[tokio::test]
async fn given_messages_enqueued_when_dequeued_then_fifo_order() {
    // GIVEN: A queue with a mix of producers
    let mut queue = MessageQueue::new();
    let handle = queue.handle();
    queue.enqueue(data("first"));
    assert!(handle.enqueue(data("second")));
    queue.enqueue(Message::ClosingOrchestrator);

    // WHEN: Draining the queue
    let drained = vec![
        queue.dequeue().await,
        queue.dequeue().await,
        queue.dequeue().await,
    ];

    // THEN: Order matches enqueue order
    assert_eq!(
        drained,
        vec![data("first"), data("second"), Message::ClosingOrchestrator]
    );
    assert!(queue.is_empty());
}

/// **VALUE**: Verifies that dequeue suspends until a producer enqueues.
///
/// **WHY THIS MATTERS**: Handlers park on their queue between requests. If
/// dequeue returned early or busy-looped, idle workers would burn CPU.
///
/// **BUG THIS CATCHES**: Would catch a dequeue that returns a default value or
/// panics on an empty queue.
#[tokio::test]
async fn given_empty_queue_when_dequeue_then_waits_until_enqueue() {
    // GIVEN: An empty queue and a producer that enqueues later
    let mut queue = MessageQueue::new();
    let handle = queue.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.enqueue(Message::NewWorkerConnected);
    });

    // WHEN: Dequeuing
    let message = tokio::time::timeout(Duration::from_secs(5), queue.dequeue())
        .await
        .expect("Dequeue never woke up");

    // THEN: The late message is delivered
    assert_eq!(message, Message::NewWorkerConnected);
}

/// **VALUE**: Verifies that a heartbeat timeout consumes nothing.
///
/// **WHY THIS MATTERS**: The handler's liveness check relies on timing out the
/// dequeue. A timeout that swallowed a message would silently drop a request.
///
/// **BUG THIS CATCHES**: Would catch a non-cancel-safe dequeue implementation.
#[tokio::test]
async fn given_empty_queue_when_dequeue_timeout_then_none_and_later_messages_kept() {
    // GIVEN: An empty queue
    let mut queue = MessageQueue::new();

    // WHEN: Waiting briefly, then enqueueing
    let timed_out = queue.dequeue_timeout(Duration::from_millis(10)).await;
    queue.enqueue(data("after-timeout"));
    let next = queue.dequeue_timeout(Duration::from_millis(10)).await;

    // THEN: First wait times out, the next one sees the message
    assert_eq!(timed_out, None);
    assert_eq!(next, Some(data("after-timeout")));
    assert_eq!(queue.len(), 0);
}

/// **VALUE**: Verifies that a handle reports delivery failure once the consumer is gone.
///
/// **WHY THIS MATTERS**: The bridge uses this to tell callers a worker has
/// gone instead of leaving them blocked on a reply that can never come.
///
/// **BUG THIS CATCHES**: Would catch handles that keep the channel alive or
/// ignore send errors.
#[tokio::test]
async fn given_queue_dropped_when_handle_enqueues_then_reports_failure() {
    // GIVEN: A handle whose queue has been dropped
    let queue = MessageQueue::new();
    let handle = queue.handle();
    assert!(handle.feeds(&queue));
    drop(queue);

    // WHEN: Enqueueing through the handle
    let delivered = handle.enqueue(Message::NewWorkerConnected);

    // THEN: Delivery fails and the handle reports closed
    assert!(!delivered);
    assert!(handle.is_closed());
}
