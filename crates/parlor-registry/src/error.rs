//! Error types for the registry layer.

use parlor_protocol::Username;

/// Errors that can occur in registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The username already has a live session. Second logins are
    /// rejected; the existing session keeps its entry.
    #[error("user {0} already has an active session")]
    AlreadyRegistered(Username),

    /// The [`Directory`](crate::Directory) could not answer.
    #[error("directory lookup failed: {0}")]
    Directory(String),
}
