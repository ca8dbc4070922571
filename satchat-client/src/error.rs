use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the synchronization core.
///
/// Network and transport failures are transient by design: callers show them
/// inline and carry on. Nothing here is fatal to the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No socket is available (never connected, mid-reconnect, or logged out).
    #[error("connection unavailable; please try again")]
    ConnectionUnavailable,

    /// Rejected before any network call: empty message.
    #[error("message cannot be empty")]
    EmptyMessage,

    /// Rejected before any network call: message over the length bound.
    #[error("message cannot exceed {limit} characters")]
    MessageTooLong { limit: usize },

    /// A send was attempted without an active room where one is required.
    #[error("no active room")]
    NoActiveRoom,

    /// The REST boundary answered with a non-success status.
    #[error("request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// Socket-level failure (handshake, frame encoding, endpoint).
    #[error("transport error: {0}")]
    Transport(String),

    /// No assistant reply arrived within the configured window.
    #[error("no response received within {0:?}")]
    ResponseTimeout(Duration),

    /// HTTP-level failure talking to the REST boundary.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    /// True for failures the user can recover from by simply retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionUnavailable | Self::Transport(_) | Self::ResponseTimeout(_) | Self::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_not_transient() {
        assert!(!ClientError::EmptyMessage.is_transient());
        assert!(!ClientError::MessageTooLong { limit: 200 }.is_transient());
        assert!(!ClientError::NoActiveRoom.is_transient());
    }

    #[test]
    fn test_connection_errors_are_transient() {
        assert!(ClientError::ConnectionUnavailable.is_transient());
        assert!(ClientError::Transport("boom".into()).is_transient());
        assert!(ClientError::ResponseTimeout(Duration::from_secs(45)).is_transient());
    }

    #[test]
    fn test_display_includes_limit() {
        let error = ClientError::MessageTooLong { limit: 200 };
        assert_eq!(error.to_string(), "message cannot exceed 200 characters");
    }
}
