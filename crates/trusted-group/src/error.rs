use crate::types::{AccountId, Operation};

/// Errors of the trusted group protocol.
///
/// Permission failures are rejected at the contract boundary with no
/// partial effect. Crypto failures are contained by the client and never
/// stop event processing.
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("permission denied: {caller} may not call {operation}")]
    PermissionDenied {
        caller: AccountId,
        operation: Operation,
    },

    #[error("no group token cached, request it first")]
    MissingToken,

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid event: {reason}")]
    InvalidEvent { reason: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl From<rmp_serde::encode::Error> for GroupError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        GroupError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for GroupError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        GroupError::Deserialization(e.to_string())
    }
}
