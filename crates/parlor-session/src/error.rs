//! Error types for the session layer.

use parlor_protocol::ProtocolError;
use parlor_transport::TransportError;

/// Errors that can occur while running a session.
///
/// Only [`Transport`](Self::Transport) ends a session. Everything else is
/// reported to the client or logged, and the session carries on.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The credentials were rejected by the
    /// [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// An envelope could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Reading from or writing to the client failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
