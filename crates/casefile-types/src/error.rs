use thiserror::Error;

/// Errors produced by type construction and parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid reference number {input:?}: {reason}")]
    InvalidReferenceNumber { input: String, reason: String },

    #[error("{kind} must not be empty")]
    EmptyIdentifier { kind: &'static str },

    #[error("serialization error: {0}")]
    Serialization(String),
}
