//! Process-wide routing authority between clients and workers.
//!
//! The bridge owns the two pieces of shared state in the relay:
//!
//! - the worker registry: [`WorkerIdentity`] → live [`QueueHandle`] and its [`ScriptName`]
//! - the pending table: per worker, the clients blocked on a reply, keyed by [`ClientId`]
//!
//! Handlers never touch either map directly; every mutation goes through the
//! methods below, each of which holds the relevant lock for its whole
//! check-then-act step.
//!
//! # Lock Order
//!
//! Only [`Bridge::retire`] holds both locks, taking the registry first and
//! the pending table second. Nothing takes them in the opposite order.

mod tokens;

pub use tokens::TokenStore;

use crate::error::bridge::BridgeError;
use crate::message::{ClientEvent, ClientId, DataMessage, Message, WorkerIdentity};
use crate::queue::{MessageQueue, QueueHandle};
use crate::script_name::ScriptName;

use common::ErrorLocation;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::{Mutex, oneshot};
use tokio::time::timeout as TokioTimeout;

/// Registry entry for one connected worker.
#[derive(Debug)]
struct WorkerEntry {
    script_name: ScriptName,
    queue: QueueHandle,
}

type PendingClients = HashMap<WorkerIdentity, HashMap<ClientId, oneshot::Sender<ClientEvent>>>;

/// Shared registry and router.
///
/// # Thread Safety
///
/// This type is `Clone` and can be shared across tasks. All clones share the
/// same underlying state.
#[derive(Clone)]
pub struct Bridge {
    tokens: Arc<TokenStore>,
    workers: Arc<Mutex<HashMap<WorkerIdentity, WorkerEntry>>>,
    pending: Arc<Mutex<PendingClients>>,
}

impl Bridge {
    pub fn new(tokens: TokenStore) -> Self {
        Self {
            tokens: Arc::new(tokens),
            workers: Arc::new(Mutex::new(HashMap::new())),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Make `queue` the authoritative queue for `identity`.
    ///
    /// If another queue is registered under the same identity, it receives
    /// [`Message::NewWorkerConnected`] before the entry is replaced, so its
    /// handler retires on its own.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidToken`] if `identity` is not in the token
    /// store. Nothing is mutated in that case.
    pub async fn register_queue(
        &self,
        identity: &WorkerIdentity,
        script_name: ScriptName,
        queue: &MessageQueue,
    ) -> Result<(), BridgeError> {
        self.tokens.validate(identity)?;

        let entry = WorkerEntry {
            script_name,
            queue: queue.handle(),
        };

        let mut workers = self.workers.lock().await;
        match workers.entry(identity.clone()) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.get();
                info!(
                    "Worker script {} superseded by {}",
                    previous.script_name, entry.script_name
                );
                if !previous.queue.enqueue(Message::NewWorkerConnected) {
                    debug!(
                        "Superseded worker script {} had already stopped",
                        previous.script_name
                    );
                }
                occupied.insert(entry);
            }
            Entry::Vacant(vacant) => {
                info!("Registered worker script {}", entry.script_name);
                vacant.insert(entry);
            }
        }

        Ok(())
    }

    /// Remove the registry entry for `identity` if `queue` still owns it.
    ///
    /// Returns `true` if an entry was removed. A handler that was superseded
    /// gets `false` and leaves its successor in place.
    pub async fn unregister(&self, identity: &WorkerIdentity, queue: &MessageQueue) -> bool {
        let mut workers = self.workers.lock().await;
        match workers.get(identity) {
            Some(entry) if entry.queue.feeds(queue) => {
                info!("Unregistered worker script {}", entry.script_name);
                workers.remove(identity);
                true
            }
            _ => false,
        }
    }

    /// Remove `identity` if `queue` still owns it and release its waiting clients.
    ///
    /// Clients receive the client form of `notice` when given (see
    /// [`broadcast`](Self::broadcast)); anyone left receives
    /// [`ClientEvent::ServerDisconnected`]. The registry lock is held
    /// throughout, so a successor cannot register and dispatch in between.
    ///
    /// Returns `false`, touching nothing, if another queue owns the identity.
    pub async fn retire(
        &self,
        identity: &WorkerIdentity,
        queue: &MessageQueue,
        notice: Option<Message>,
    ) -> bool {
        let mut workers = self.workers.lock().await;
        let Some(entry) = workers.get(identity) else {
            return false;
        };
        if !entry.queue.feeds(queue) {
            return false;
        }

        if let Some(entry) = workers.remove(identity) {
            info!("Retired worker script {}", entry.script_name);
        }

        let notified = match notice {
            Some(notice) => self.broadcast(identity, notice).await,
            None => 0,
        };
        let released = self.send_message_to_all_clients(identity).await;
        drop(workers);

        if notified + released > 0 {
            debug!("Released {} client(s) of worker {identity}", notified + released);
        }
        true
    }

    /// Unblock every client still waiting on a previous connection for `identity`.
    ///
    /// Each receives [`ClientEvent::ServerDisconnected`]. No-op if none wait.
    pub async fn clear_all_clients(&self, identity: &WorkerIdentity) {
        let cleared = self
            .drain_pending(identity, ClientEvent::ServerDisconnected)
            .await;
        if cleared > 0 {
            info!("Cleared {cleared} stale client(s) for worker {identity}");
        }
    }

    /// Enqueue `message` on the queue registered for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NoWorker`] if no worker is registered or its
    /// handler has already gone. The message is dropped.
    pub async fn send_message(
        &self,
        client_id: &ClientId,
        identity: &WorkerIdentity,
        message: Message,
    ) -> Result<(), BridgeError> {
        let workers = self.workers.lock().await;

        let Some(entry) = workers.get(identity) else {
            warn!("No worker registered for {identity}, dropping message from client {client_id}");
            return Err(BridgeError::NoWorker {
                message: format!("No worker registered for {identity}"),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let kind = message.kind();
        if !entry.queue.enqueue(message) {
            warn!(
                "Worker script {} stopped consuming, dropping message from client {client_id}",
                entry.script_name
            );
            return Err(BridgeError::NoWorker {
                message: format!("Worker script {} is no longer consuming", entry.script_name),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        debug!(
            "Queued {kind} from client {client_id} for worker script {}",
            entry.script_name
        );
        Ok(())
    }

    /// Hand a worker's reply to the client waiting on `client_id`.
    ///
    /// Returns `false` if no such client is waiting (it gave up or was cleared).
    pub async fn resolve_reply(
        &self,
        client_id: &ClientId,
        identity: &WorkerIdentity,
        data: Value,
    ) -> bool {
        let waiter = {
            let mut pending = self.pending.lock().await;
            let Some(clients) = pending.get_mut(identity) else {
                return false;
            };
            let waiter = clients.remove(client_id);
            if clients.is_empty() {
                pending.remove(identity);
            }
            waiter
        };

        match waiter {
            Some(sender) => sender.send(ClientEvent::Reply(data)).is_ok(),
            None => false,
        }
    }

    /// Deliver `message` to every client waiting on `identity`.
    ///
    /// Only [`Message::ServerScriptDisconnectedEvent`] means anything to a
    /// client; other variants are logged and ignored. Returns the number of
    /// clients unblocked.
    pub async fn broadcast(&self, identity: &WorkerIdentity, message: Message) -> usize {
        let kind = message.kind();
        let Some(event) = message.into_client_event() else {
            warn!("Refusing to broadcast {kind} to clients of worker {identity}");
            return 0;
        };

        let notified = self.drain_pending(identity, event).await;
        debug!("Broadcast {kind} to {notified} client(s) of worker {identity}");
        notified
    }

    /// Tell every client still waiting on `identity` that the server side went away.
    pub async fn send_message_to_all_clients(&self, identity: &WorkerIdentity) -> usize {
        self.drain_pending(identity, ClientEvent::ServerDisconnected)
            .await
    }

    /// Send `payload` to the worker registered as `identity` and wait for its reply.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::NoWorker`] - nobody to deliver to
    /// - [`BridgeError::ScriptDisconnected`] - the worker closed its connection first
    /// - [`BridgeError::ServerDisconnected`] - the handler failed or was replaced
    pub async fn request(
        &self,
        identity: &WorkerIdentity,
        payload: Value,
    ) -> Result<Value, BridgeError> {
        let (_, receiver) = self.dispatch(identity, payload).await?;
        Self::await_reply(receiver).await
    }

    /// [`request`](Self::request) with a caller-side deadline.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request), plus [`BridgeError::RequestTimeout`]
    /// when no reply arrives within `wait`.
    pub async fn request_with_timeout(
        &self,
        identity: &WorkerIdentity,
        payload: Value,
        wait: Duration,
    ) -> Result<Value, BridgeError> {
        let (client_id, receiver) = self.dispatch(identity, payload).await?;

        match TokioTimeout(wait, Self::await_reply(receiver)).await {
            Ok(result) => result,
            Err(_) => {
                self.remove_pending(identity, &client_id).await;
                Err(BridgeError::RequestTimeout {
                    message: format!("No reply for client {client_id} within {wait:?}"),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
        }
    }

    /// Retire every registered worker and unblock every waiting client.
    pub async fn close_all(&self) {
        let retired: Vec<WorkerEntry> = {
            let mut workers = self.workers.lock().await;
            workers.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &retired {
            entry.queue.enqueue(Message::ClosingOrchestrator);
        }

        let stranded: PendingClients = std::mem::take(&mut *self.pending.lock().await);
        let mut unblocked = 0;
        for sender in stranded.into_values().flat_map(HashMap::into_values) {
            if sender.send(ClientEvent::ServerDisconnected).is_ok() {
                unblocked += 1;
            }
        }

        info!(
            "Closed {} worker queue(s), unblocked {unblocked} client(s)",
            retired.len()
        );
    }

    /// Producer handle for the queue currently registered under `identity`.
    pub async fn queue_for(&self, identity: &WorkerIdentity) -> Option<QueueHandle> {
        self.workers
            .lock()
            .await
            .get(identity)
            .map(|entry| entry.queue.clone())
    }

    pub async fn script_name_for(&self, identity: &WorkerIdentity) -> Option<ScriptName> {
        self.workers
            .lock()
            .await
            .get(identity)
            .map(|entry| entry.script_name.clone())
    }

    /// Names of all currently registered worker scripts.
    pub async fn connected_workers(&self) -> Vec<ScriptName> {
        self.workers
            .lock()
            .await
            .values()
            .map(|entry| entry.script_name.clone())
            .collect()
    }

    /// Number of clients currently blocked on `identity`.
    pub async fn pending_count(&self, identity: &WorkerIdentity) -> usize {
        self.pending
            .lock()
            .await
            .get(identity)
            .map_or(0, HashMap::len)
    }

    async fn dispatch(
        &self,
        identity: &WorkerIdentity,
        payload: Value,
    ) -> Result<(ClientId, oneshot::Receiver<ClientEvent>), BridgeError> {
        let client_id = ClientId::generate();
        let (sender, receiver) = oneshot::channel();

        // Registered before sending so a fast reply always finds its waiter.
        self.pending
            .lock()
            .await
            .entry(identity.clone())
            .or_default()
            .insert(client_id.clone(), sender);

        let message = Message::Data(DataMessage {
            client_id: client_id.clone(),
            recipient_id: identity.clone(),
            payload,
        });

        if let Err(error) = self.send_message(&client_id, identity, message).await {
            self.remove_pending(identity, &client_id).await;
            return Err(error);
        }

        Ok((client_id, receiver))
    }

    async fn await_reply(receiver: oneshot::Receiver<ClientEvent>) -> Result<Value, BridgeError> {
        match receiver.await {
            Ok(ClientEvent::Reply(data)) => Ok(data),
            Ok(ClientEvent::ServerScriptDisconnected(script_name)) => {
                Err(BridgeError::ScriptDisconnected {
                    script_name: script_name.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
            Ok(ClientEvent::ServerDisconnected) | Err(_) => Err(BridgeError::ServerDisconnected {
                message: String::from("Worker connection ended before replying"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    async fn remove_pending(&self, identity: &WorkerIdentity, client_id: &ClientId) {
        let mut pending = self.pending.lock().await;
        if let Some(clients) = pending.get_mut(identity) {
            clients.remove(client_id);
            if clients.is_empty() {
                pending.remove(identity);
            }
        }
    }

    async fn drain_pending(&self, identity: &WorkerIdentity, event: ClientEvent) -> usize {
        let Some(clients) = self.pending.lock().await.remove(identity) else {
            return 0;
        };

        clients
            .into_values()
            .filter(|sender| !sender.is_closed())
            .map(|sender| sender.send(event.clone()))
            .filter(Result::is_ok)
            .count()
    }
}
