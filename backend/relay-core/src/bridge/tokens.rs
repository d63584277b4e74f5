//! Accepted worker tokens.

use crate::error::bridge::BridgeError;
use crate::message::WorkerIdentity;

use common::ErrorLocation;

use std::collections::HashSet;
use std::panic::Location;

/// The set of identities allowed to register as workers.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    tokens: HashSet<WorkerIdentity>,
}

impl TokenStore {
    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(WorkerIdentity::new).collect(),
        }
    }

    pub fn insert(&mut self, token: impl Into<String>) -> bool {
        self.tokens.insert(WorkerIdentity::new(token))
    }

    pub fn contains(&self, identity: &WorkerIdentity) -> bool {
        self.tokens.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Check `identity` against the store.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidToken`] if the identity is unknown.
    #[track_caller]
    pub fn validate(&self, identity: &WorkerIdentity) -> Result<(), BridgeError> {
        if self.contains(identity) {
            Ok(())
        } else {
            Err(BridgeError::InvalidToken {
                message: format!("Unrecognised worker token {identity}"),
                location: ErrorLocation::from(Location::caller()),
            })
        }
    }
}
