// Error taxonomy for the orchestration engine

use thiserror::Error;
use uuid::Uuid;

use crate::persistence::StoreError;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, GovernanceError>;

/// Errors surfaced synchronously to the initiating caller
///
/// Structural and validation failures are rejected before any engine action
/// record is created. Once a record exists, further failure is expressed as
/// a terminal status on that record, never as an error to a caller that has
/// already received an id.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// Malformed or missing identifier, empty request type, unresolvable target
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Caller lacks rights to initiate against the named engine or process
    #[error("user not authorized: {0}")]
    UserNotAuthorized(String),

    /// Malformed process graph or unknown engine name
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The metadata store is unreachable or returned an inconsistent result
    #[error("property server error: {0}")]
    PropertyServer(String),

    /// Engine action not found
    #[error("engine action not found: {0}")]
    ActionNotFound(Uuid),

    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl GovernanceError {
    /// Create an invalid parameter error
    pub fn invalid(msg: impl Into<String>) -> Self {
        GovernanceError::InvalidParameter(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        GovernanceError::Configuration(msg.into())
    }
}
