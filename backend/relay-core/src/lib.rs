pub mod bridge;
pub mod config;
pub mod error;
pub mod message;
pub mod queue;
pub mod relay;
pub mod script_name;

#[cfg(test)]
mod tests;

pub const RELAY_HOSTNAME: &str = "127.0.0.1";
pub const RELAY_DEFAULT_PORT: u16 = 8765;
pub const RELAY_DEFAULT_ADDRESS: &str =
    const_format::concatcp!(RELAY_HOSTNAME, ":", RELAY_DEFAULT_PORT);
pub const DEFAULT_HEARTBEAT_TIMEOUT_MS: u64 = 30_000;
