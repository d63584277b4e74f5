pub mod bridge;
pub mod config;
pub mod handler;
pub mod relay;

pub use bridge::BridgeError;
pub use config::ConfigError;
pub use handler::HandlerError;
pub use relay::RelayError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Relay(#[from] RelayError),
}
