//! Per-connection worker state machine.
//!
//! ```text
//! AwaitingAuth ──auth ok──▶ Active ──retired / EOF / error──▶ Terminated
//!      │                                                          ▲
//!      └──────────── missing / invalid code, EOF, bad JSON ───────┘
//! ```
//!
//! While `Active`, the handler waits on its queue with the heartbeat as a
//! bound. A timeout is not an error: it only triggers an opportunistic check
//! for a closed peer. Idle workers that are still connected are kept; a line
//! sent while no request is outstanding is a protocol fault.
//!
//! On exit the handler retires through [`Bridge::retire`]. Only the handler
//! that still owns the registry entry releases the waiting clients, so a
//! superseded handler that fails late cannot touch its successor's requests.

use crate::bridge::Bridge;
use crate::error::bridge::BridgeError;
use crate::error::handler::HandlerError;
use crate::message::{DataMessage, Message, WorkerIdentity};
use crate::queue::MessageQueue;
use crate::relay::connection::{PeerConnection, PeerStatus};
use crate::relay::wire::{
    AuthCode, AuthResponse, INVALID_CODE, InboundReply, MISSING_AUTH_CODE, OutboundData,
    auth_code,
};
use crate::script_name::ScriptName;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

/// Lifecycle of a [`ConnectionHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    AwaitingAuth,
    Active,
    Terminated,
}

/// Why the active loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServeExit {
    /// Superseded, shut down or stopped.
    Retired,
    /// The worker closed its side.
    PeerClosed,
}

/// What a successful authentication leaves behind.
struct WorkerSession {
    identity: WorkerIdentity,
    script_name: ScriptName,
    queue: MessageQueue,
}

/// Drives one worker connection from authentication to termination.
pub struct ConnectionHandler<S> {
    connection: PeerConnection<S>,
    bridge: Bridge,
    heartbeat: Duration,
    stop: Arc<AtomicBool>,
    state: HandlerState,
    script_name: Option<ScriptName>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite,
{
    pub fn new(stream: S, bridge: Bridge, heartbeat: Duration) -> Self {
        Self {
            connection: PeerConnection::new(stream),
            bridge,
            heartbeat,
            stop: Arc::new(AtomicBool::new(false)),
            state: HandlerState::AwaitingAuth,
            script_name: None,
        }
    }

    /// Flag checked once per loop iteration; setting it ends the handler
    /// at its next heartbeat.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Name assigned at authentication, if it succeeded.
    pub fn script_name(&self) -> Option<&ScriptName> {
        self.script_name.as_ref()
    }

    /// Authenticate the peer, then relay queued requests until retired.
    ///
    /// Always returns [`HandlerState::Terminated`]. Closing the transport is
    /// left to the caller (see [`close`](Self::close)).
    pub async fn run(&mut self) -> HandlerState {
        let mut session = match self.authenticate().await {
            Ok(Some(session)) => session,
            Ok(None) => return self.terminate(),
            Err(error) => {
                warn!(
                    "Connection dropped during authentication ({}): {}",
                    error.kind(),
                    error
                );
                return self.terminate();
            }
        };

        self.state = HandlerState::Active;

        let disconnect_notice = Message::ServerScriptDisconnectedEvent {
            script_name: session.script_name.clone(),
        };
        let notice = match self.serve(&mut session).await {
            Ok(ServeExit::Retired) => None,
            Ok(ServeExit::PeerClosed) => Some(disconnect_notice),
            Err(error) => {
                error!(
                    "Worker script {} failed ({}): {}",
                    session.script_name,
                    error.kind(),
                    error
                );
                Some(disconnect_notice)
            }
        };

        // Waiting clients belong to whoever holds the registry entry now.
        if !self
            .bridge
            .retire(&session.identity, &session.queue, notice)
            .await
        {
            debug!(
                "Worker script {} no longer registered, leaving clients to its successor",
                session.script_name
            );
        }
        self.terminate()
    }

    /// Shut the write side of the transport down.
    pub async fn close(&mut self) {
        if let Err(e) = self.connection.shutdown().await {
            debug!("Error while closing worker connection: {e}");
        }
    }

    /// Read the auth line and register with the bridge.
    ///
    /// `Ok(None)` means the peer was refused and already told why.
    async fn authenticate(&mut self) -> Result<Option<WorkerSession>, HandlerError> {
        let Some(request) = self.connection.read_message().await? else {
            debug!("Peer disconnected before sending auth");
            return Ok(None);
        };

        let code = match auth_code(&request) {
            AuthCode::Present(code) => code,
            AuthCode::Missing => {
                warn!("Auth failed: missing authentication code");
                self.connection
                    .write_message(&AuthResponse::Error(MISSING_AUTH_CODE.to_string()))
                    .await?;
                return Ok(None);
            }
            AuthCode::Malformed => {
                warn!("Auth failed: auth_code is not a string");
                self.connection
                    .write_message(&AuthResponse::Error(INVALID_CODE.to_string()))
                    .await?;
                return Ok(None);
            }
        };
        let identity = WorkerIdentity::new(code);

        self.bridge.clear_all_clients(&identity).await;

        let script_name = ScriptName::generate();
        let queue = MessageQueue::new();

        match self
            .bridge
            .register_queue(&identity, script_name.clone(), &queue)
            .await
        {
            Ok(()) => {}
            Err(BridgeError::InvalidToken { .. }) => {
                warn!("Auth failed: invalid code {identity}");
                self.connection
                    .write_message(&AuthResponse::Error(INVALID_CODE.to_string()))
                    .await?;
                return Ok(None);
            }
            Err(other) => return Err(other.into()),
        }

        info!("Worker script {script_name} authenticated");
        self.script_name = Some(script_name.clone());

        let session = WorkerSession {
            identity,
            script_name,
            queue,
        };

        // If the success line cannot be written, give the identity back.
        if let Err(error) = self
            .connection
            .write_message(&AuthResponse::Success(session.script_name.to_string()))
            .await
        {
            self.bridge
                .unregister(&session.identity, &session.queue)
                .await;
            return Err(error);
        }

        Ok(Some(session))
    }

    /// The active loop. Returns `Ok` when the handler ends without a protocol fault.
    async fn serve(&mut self, session: &mut WorkerSession) -> Result<ServeExit, HandlerError> {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                info!("Worker script {} asked to stop", session.script_name);
                return Ok(ServeExit::Retired);
            }

            let Some(message) = session.queue.dequeue_timeout(self.heartbeat).await else {
                match self.connection.peek_status() {
                    PeerStatus::Idle => continue,
                    PeerStatus::Closed => {
                        info!("Worker script {} disconnected", session.script_name);
                        return Ok(ServeExit::PeerClosed);
                    }
                    PeerStatus::Unsolicited => {
                        return Err(HandlerError::invalid_message(format!(
                            "Worker script {} sent data with no request outstanding",
                            session.script_name
                        )));
                    }
                }
            };

            match message {
                Message::NewWorkerConnected => {
                    info!(
                        "Worker script {} replaced by a newer connection",
                        session.script_name
                    );
                    return Ok(ServeExit::Retired);
                }
                Message::ClosingOrchestrator => {
                    info!("Worker script {} closing for shutdown", session.script_name);
                    return Ok(ServeExit::Retired);
                }
                Message::Data(data) => self.relay(session, data).await?,
                Message::ServerScriptDisconnectedEvent { script_name } => {
                    return Err(HandlerError::invalid_message(format!(
                        "Disconnect notice for {script_name} arrived on a worker queue"
                    )));
                }
            }
        }
    }

    /// Forward one request and hand back its reply.
    async fn relay(
        &mut self,
        session: &WorkerSession,
        data: DataMessage,
    ) -> Result<(), HandlerError> {
        let DataMessage {
            client_id,
            recipient_id,
            payload,
        } = data;

        if recipient_id != session.identity {
            return Err(HandlerError::invalid_message(format!(
                "Message for {recipient_id} routed to worker script {}",
                session.script_name
            )));
        }

        self.connection
            .write_message(&OutboundData {
                client_id: &client_id,
                data: &payload,
            })
            .await?;

        let reply = self
            .connection
            .read_message()
            .await?
            .ok_or_else(|| HandlerError::Read {
                message: format!("Worker closed before replying to client {client_id}"),
                location: ErrorLocation::from(Location::caller()),
            })?;
        let reply = InboundReply::parse(reply)?;

        if reply.client_id != client_id.as_str() {
            return Err(HandlerError::invalid_message(format!(
                "Reply for client {} does not match outstanding client {client_id}",
                reply.client_id
            )));
        }

        if !self
            .bridge
            .resolve_reply(&client_id, &session.identity, reply.data)
            .await
        {
            debug!("Client {client_id} stopped waiting before its reply arrived");
        }

        Ok(())
    }

    fn terminate(&mut self) -> HandlerState {
        self.state = HandlerState::Terminated;
        self.state
    }
}
