use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum BridgeError {
    #[error("Invalid Token Error: {message} {location}")]
    InvalidToken {
        message: String,
        location: ErrorLocation,
    },

    #[error("No Worker Error: {message} {location}")]
    NoWorker {
        message: String,
        location: ErrorLocation,
    },

    #[error("Script Disconnected Error: worker script {script_name} went away {location}")]
    ScriptDisconnected {
        script_name: String,
        location: ErrorLocation,
    },

    #[error("Server Disconnected Error: {message} {location}")]
    ServerDisconnected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Request Timeout Error: {message} {location}")]
    RequestTimeout {
        message: String,
        location: ErrorLocation,
    },
}
