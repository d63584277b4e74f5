//! Worker-facing side of the relay.
//!
//! # Architecture
//!
//! - [`server`] - TCP accept loop, one task per connection
//! - [`orchestrator`] - tracks live handlers for bulk shutdown
//! - [`handler`] - per-connection state machine (auth, then relay loop)
//! - [`connection`] - newline-delimited JSON framing over a byte stream
//! - [`wire`] - the JSON shapes exchanged with workers
//!
//! # Protocol
//!
//! 1. Worker sends `{"auth_code": "<token>"}`
//! 2. Relay answers `{"success": "<script name>"}` or `{"error": "<reason>"}`
//! 3. For each queued request the relay writes `{"client_id", "data"}` and
//!    reads exactly one reply carrying the same `client_id`

pub mod connection;
pub mod handler;
pub mod orchestrator;
pub mod server;
pub mod wire;

mod handle;

pub use connection::{PeerConnection, PeerStatus};
pub use handle::RelayServerHandle;
pub use handler::{ConnectionHandler, HandlerState};
pub use orchestrator::Orchestrator;
pub use server::start_relay_server;
