use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when a secret-bearing type is handed to a serializer.
#[derive(Debug, ThisError)]
pub enum RedactError {
    #[error("Redaction Error: {type_name} refuses to serialize; {hint} {location}")]
    Serialization {
        type_name: &'static str,
        hint: &'static str,
        location: ErrorLocation,
    },
}
