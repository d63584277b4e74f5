//! JSON shapes exchanged with worker scripts.

use crate::error::handler::HandlerError;
use crate::message::ClientId;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const AUTH_CODE_FIELD: &str = "auth_code";
pub const CLIENT_ID_FIELD: &str = "client_id";
pub const DATA_FIELD: &str = "data";

pub const MISSING_AUTH_CODE: &str = "Missing authentication code";
pub const INVALID_CODE: &str = "Invalid code";

/// Answer to the authentication line: `{"success": name}` or `{"error": reason}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthResponse {
    Success(String),
    Error(String),
}

/// Request forwarded to a worker.
#[derive(Debug, Serialize)]
pub struct OutboundData<'a> {
    pub client_id: &'a ClientId,
    pub data: &'a Value,
}

/// Worker reply to an [`OutboundData`].
#[derive(Debug, Clone, PartialEq)]
pub struct InboundReply {
    pub client_id: String,
    pub data: Value,
}

impl InboundReply {
    /// Pull `client_id` and `data` out of a reply line.
    ///
    /// A missing `data` field is treated as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidMessage`] if the reply is not an object
    /// or has no string `client_id`.
    pub fn parse(reply: Value) -> Result<Self, HandlerError> {
        let Value::Object(mut fields) = reply else {
            return Err(HandlerError::invalid_message(
                "Worker reply is not a JSON object",
            ));
        };

        let client_id = match fields.remove(CLIENT_ID_FIELD) {
            Some(Value::String(client_id)) => client_id,
            Some(_) => {
                return Err(HandlerError::invalid_message(
                    "Worker reply has a non-string client_id",
                ));
            }
            None => {
                return Err(HandlerError::invalid_message(
                    "Worker reply is missing client_id",
                ));
            }
        };

        let data = fields.remove(DATA_FIELD).unwrap_or(Value::Null);

        Ok(Self { client_id, data })
    }
}

/// The `auth_code` field of an authentication line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthCode<'a> {
    /// No `auth_code` field (or the line is not an object).
    Missing,
    /// The field is present but not a string; it can never match a token.
    Malformed,
    Present(&'a str),
}

pub fn auth_code(message: &Value) -> AuthCode<'_> {
    match message.get(AUTH_CODE_FIELD) {
        None => AuthCode::Missing,
        Some(Value::String(code)) => AuthCode::Present(code),
        Some(_) => AuthCode::Malformed,
    }
}
