use crate::error::bridge::BridgeError;

use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

/// Failures inside a single worker connection.
///
/// None of these escape the handler: they end the connection and are turned
/// into disconnect notifications for the clients waiting on that worker.
#[derive(Debug, ThisError)]
pub enum HandlerError {
    #[error("Invalid Message Error: {message} {location}")]
    InvalidMessage {
        message: String,
        location: ErrorLocation,
    },

    #[error("Read Error: {message} {location}")]
    Read {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("JSON Error: {message} {location}")]
    Json {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },

    #[error("Bridge Error: {source} {location}")]
    Bridge {
        #[source]
        source: BridgeError,
        location: ErrorLocation,
    },
}

impl HandlerError {
    /// Short variant name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::InvalidMessage { .. } => "InvalidMessage",
            HandlerError::Read { .. } => "Read",
            HandlerError::Send { .. } => "Send",
            HandlerError::Json { .. } => "Json",
            HandlerError::Io { .. } => "Io",
            HandlerError::Bridge { .. } => "Bridge",
        }
    }

    #[track_caller]
    pub(crate) fn invalid_message(message: impl Into<String>) -> Self {
        HandlerError::InvalidMessage {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<IoError> for HandlerError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        HandlerError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        HandlerError::Json {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<BridgeError> for HandlerError {
    #[track_caller]
    fn from(error: BridgeError) -> Self {
        HandlerError::Bridge {
            source: error,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
