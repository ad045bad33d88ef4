//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, wrong field types, or truncated
    /// records.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope parsed but does not name any known command, or its
    /// payload has the wrong shape for the command it names.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
