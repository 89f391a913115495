//! Errors raised by host implementations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host cannot provide this capability at all (no media session
    /// service, no notification permission).
    #[error("Host capability unavailable: {0}")]
    NotAvailable(String),

    /// A host call was attempted and rejected.
    #[error("Host operation failed: {0}")]
    OperationFailed(String),

    #[error("Settings database error: {0}")]
    DatabaseError(String),

    /// The remote side of a method channel replied with an error.
    #[error("Method '{method}' failed on the remote side: {message}")]
    Transport { method: String, message: String },

    /// The remote side has no handler for the method.
    #[error("Method '{0}' is not implemented by the remote side")]
    NotImplemented(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// True when retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::OperationFailed(_) | Self::DatabaseError(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
