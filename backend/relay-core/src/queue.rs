//! Per-worker message queue.
//!
//! An unbounded FIFO with exactly one consumer (the connection handler that
//! owns the [`MessageQueue`]) and any number of producers holding a
//! [`QueueHandle`]. Enqueue never blocks; dequeue suspends the task, not the
//! thread.

use crate::message::Message;

use std::future::pending;
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::timeout as TokioTimeout;

/// Consumer side of a worker queue.
#[derive(Debug)]
pub struct MessageQueue {
    sender: UnboundedSender<Message>,
    receiver: UnboundedReceiver<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded_channel();
        Self { sender, receiver }
    }

    /// Producer handle sharing this queue.
    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            sender: self.sender.clone(),
        }
    }

    /// Append to the tail.
    pub fn enqueue(&self, message: Message) {
        // The receiver lives in `self`, so the channel cannot be closed here.
        let _ = self.sender.send(message);
    }

    /// Take the head message, waiting until one is available.
    pub async fn dequeue(&mut self) -> Message {
        match self.receiver.recv().await {
            Some(message) => message,
            // Unreachable while `self.sender` is alive.
            None => pending().await,
        }
    }

    /// Like [`dequeue`](Self::dequeue) but gives up after `wait`.
    ///
    /// A timeout consumes nothing; the next call still sees messages in order.
    pub async fn dequeue_timeout(&mut self, wait: Duration) -> Option<Message> {
        TokioTimeout(wait, self.dequeue()).await.ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of a worker queue, as stored in the bridge registry.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    sender: UnboundedSender<Message>,
}

impl QueueHandle {
    /// Append to the tail of the queue.
    ///
    /// Returns `false` when the consuming handler has already dropped its
    /// queue, in which case the message is discarded.
    pub fn enqueue(&self, message: Message) -> bool {
        self.sender.send(message).is_ok()
    }

    /// Whether the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether this handle feeds `queue`.
    pub fn feeds(&self, queue: &MessageQueue) -> bool {
        self.sender.same_channel(&queue.sender)
    }
}
