//! Core error types

use thiserror::Error;

/// Backend errors, grouped by how the caller is expected to react:
/// connection loss cascades into teardown, target destruction is normal
/// output removal, everything else is reported and survived.
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("host connection lost: {0}")]
    ConnectionLost(String),

    #[error("host target destroyed")]
    TargetDestroyed,

    #[error("resource exhausted: {0}")]
    Exhausted(String),

    #[error("unsupported output state bits: {0:#x}")]
    UnsupportedState(u32),

    #[error("unknown key code: {0}")]
    UnknownKeycode(u32),

    #[error("invalid output ID: {0}")]
    InvalidOutputId(u32),

    #[error("backend state error: {0}")]
    StateError(String),
}

impl BackendError {
    pub fn connection_lost(msg: impl Into<String>) -> Self {
        Self::ConnectionLost(msg.into())
    }

    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::Exhausted(msg.into())
    }

    pub fn state_error(msg: impl Into<String>) -> Self {
        Self::StateError(msg.into())
    }
}

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;
