//! Shared building blocks for the worker relay.
//!
//! Everything here is free of relay semantics so that both the core library
//! and the daemon binary can depend on it:
//!
//! - [`ErrorLocation`] - call-site capture attached to every error variant
//! - [`RedactedToken`] - worker auth tokens that never leak into logs

pub mod error;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_token::RedactedToken;
