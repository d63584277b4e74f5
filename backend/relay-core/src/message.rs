//! Messages exchanged between the bridge, worker queues and waiting clients.
//!
//! Two closed sets live here:
//!
//! - [`Message`] - what a worker's [`MessageQueue`](crate::queue::MessageQueue) carries
//! - [`ClientEvent`] - what a pending client request resolves to

use crate::script_name::ScriptName;

use common::RedactedToken;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Token a worker presents at authentication; also the key its queue is registered under.
///
/// Never printed in clear. `Display` yields the redacted form.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct WorkerIdentity(RedactedToken);

impl WorkerIdentity {
    pub fn new(token: impl Into<String>) -> Self {
        Self(RedactedToken::new(token))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for WorkerIdentity {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for WorkerIdentity {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

impl fmt::Debug for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkerIdentity({:?})", self.0)
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Correlation key tying one client request to exactly one worker reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A client request routed to the worker named by `recipient_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataMessage {
    pub client_id: ClientId,
    pub recipient_id: WorkerIdentity,
    pub payload: Value,
}

/// Everything a worker queue can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A newer connection took over this worker identity.
    NewWorkerConnected,
    /// The relay is shutting down.
    ClosingOrchestrator,
    /// A request to forward to the worker.
    Data(DataMessage),
    /// Disconnect notice for clients of a worker; never valid on a worker queue.
    ServerScriptDisconnectedEvent { script_name: ScriptName },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::NewWorkerConnected => "NewWorkerConnected",
            Message::ClosingOrchestrator => "ClosingOrchestrator",
            Message::Data(_) => "DataMessage",
            Message::ServerScriptDisconnectedEvent { .. } => "ServerScriptDisconnectedEvent",
        }
    }

    /// The event waiting clients should see for a broadcast of this message.
    ///
    /// Only disconnect notices are meaningful to clients.
    pub fn into_client_event(self) -> Option<ClientEvent> {
        match self {
            Message::ServerScriptDisconnectedEvent { script_name } => {
                Some(ClientEvent::ServerScriptDisconnected(script_name))
            }
            Message::NewWorkerConnected | Message::ClosingOrchestrator | Message::Data(_) => None,
        }
    }
}

/// Outcome delivered to a client blocked on a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The `data` field of the worker's correlated reply.
    Reply(Value),
    /// The worker connection closed while the request was outstanding.
    ServerScriptDisconnected(ScriptName),
    /// The handler serving the worker failed or was replaced.
    ServerDisconnected,
}
