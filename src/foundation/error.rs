use std::time::Duration;

use crate::link::connection::ConnectionState;
use crate::protocol::messages::MessageType;

/// Standard result type for this crate.
pub type PixelsResult<T> = Result<T, PixelsError>;

/// Top-level error type for dataset compilation and die communication.
#[derive(thiserror::Error, Debug)]
pub enum PixelsError {
    /// Input or configuration validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The authoring graph cannot be flattened into a dataset.
    #[error("compile error: {0}")]
    Compile(String),

    /// An inbound packet could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// No reply arrived within a single wait window.
    #[error("timed out after {timeout:?} waiting for {awaiting:?}")]
    ProtocolTimeout {
        /// Message type that was expected.
        awaiting: MessageType,
        /// Length of the wait window.
        timeout: Duration,
    },

    /// Every attempt of a retried message timed out.
    #[error("no {awaiting:?} after {attempts} attempts")]
    RetriesExhausted {
        /// Message type that was expected.
        awaiting: MessageType,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The die refused a transfer (usually not enough memory).
    #[error("transfer rejected: {0}")]
    TransferRejected(String),

    /// An operation was issued below the required connection state.
    #[error("die not connected (state {state:?})")]
    NotConnected {
        /// State observed when the operation was attempted.
        state: ConnectionState,
    },

    /// The transport reported a failure.
    #[error("link error: {0}")]
    Link(String),

    /// Catch-all for wrapped external errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PixelsError {
    /// Build a [`PixelsError::Validation`] from a message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PixelsError::Compile`] from a message.
    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    /// Build a [`PixelsError::Decode`] from a message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`PixelsError::TransferRejected`] from a message.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::TransferRejected(msg.into())
    }

    /// Build a [`PixelsError::Link`] from a message.
    pub fn link(msg: impl Into<String>) -> Self {
        Self::Link(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
