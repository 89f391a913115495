//! Error types for the session core

use std::time::Duration;

use bridge_traits::BridgeError;
use thiserror::Error;

use crate::channel::ChannelKind;
use crate::pending::PendingCommand;

#[derive(Error, Debug)]
pub enum SessionError {
    /// The platform referenced a queue handle this bridge never assigned.
    #[error("Unknown queue handle: {0}")]
    UnknownHandle(i64),

    #[error("No transport bound to the {0} channel")]
    ChannelUnavailable(ChannelKind),

    #[error("Pending {command} on the {channel} channel was superseded by a newer request")]
    Superseded {
        channel: ChannelKind,
        command: PendingCommand,
    },

    #[error("Pending {command} on the {channel} channel timed out after {after:?}")]
    TimedOut {
        channel: ChannelKind,
        command: PendingCommand,
        after: Duration,
    },

    #[error("Pending {command} was cancelled because the session was destroyed")]
    Cancelled { command: PendingCommand },

    #[error("Malformed arguments for '{method}': {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown method '{0}'")]
    UnknownMethod(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),
}

impl SessionError {
    /// Errors a caller may retry after the other side catches up.
    pub fn is_transient(&self) -> bool {
        match self {
            SessionError::ChannelUnavailable(_)
            | SessionError::TimedOut { .. }
            | SessionError::Superseded { .. } => true,
            SessionError::Bridge(err) => err.is_transient(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SessionError::UnknownHandle(7);
        assert_eq!(err.to_string(), "Unknown queue handle: 7");

        let err = SessionError::Superseded {
            channel: ChannelKind::Client,
            command: PendingCommand::Configure,
        };
        assert_eq!(
            err.to_string(),
            "Pending configure on the client channel was superseded by a newer request"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(SessionError::ChannelUnavailable(ChannelKind::Handler).is_transient());
        assert!(!SessionError::UnknownHandle(1).is_transient());
        assert!(!SessionError::Cancelled {
            command: PendingCommand::Start
        }
        .is_transient());
        assert!(SessionError::Bridge(BridgeError::DatabaseError("locked".into())).is_transient());
        assert!(!SessionError::Bridge(BridgeError::NotImplemented("search".into())).is_transient());
    }
}
