use common::ErrorLocation;

use relay_core::error::{ConfigError, CoreError, RelayError};

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the relay daemon.
///
/// Core failures are flattened to a message here; the core error already
/// carries its own location in that message.
#[derive(Debug, Error)]
pub enum RelaydError {
    /// Error from this binary (logging, signals, filesystem setup)
    #[error("Relayd Error: {message} {location}")]
    Relayd {
        message: String,
        location: ErrorLocation,
    },

    /// Error from relay-core (config, bind)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for RelaydError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        RelaydError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for RelaydError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        RelaydError::from(CoreError::from(error))
    }
}

impl From<RelayError> for RelaydError {
    #[track_caller]
    fn from(error: RelayError) -> Self {
        RelaydError::from(CoreError::from(error))
    }
}
