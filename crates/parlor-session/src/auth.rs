//! Credential checking for the login handshake.
//!
//! Parlor doesn't store passwords itself. The [`Authenticator`] trait is
//! the seam: the session hands it the `[username, secret]` pair from a
//! `MSG-ARRAY` envelope and gets back a [`User`] profile or an error.
//! Production deployments back it with a real user store;
//! [`StaticAuthenticator`] is an in-memory table for demos and tests.

use std::collections::HashMap;
use std::future::Future;

use parlor_protocol::{User, Username};

use crate::SessionError;

/// Validates credentials and returns the matching profile.
///
/// `Send + Sync + 'static` because one authenticator is shared by every
/// session task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use parlor_protocol::{User, Username};
/// use parlor_session::{Authenticator, SessionError};
///
/// /// Accepts anyone whose secret is their name reversed.
/// struct MirrorAuthenticator;
///
/// impl Authenticator for MirrorAuthenticator {
///     async fn authenticate(
///         &self,
///         username: &Username,
///         secret: &str,
///     ) -> Result<User, SessionError> {
///         let expected: String = username.as_str().chars().rev().collect();
///         if secret == expected {
///             Ok(User::new(username.clone()))
///         } else {
///             Err(SessionError::AuthFailed("bad secret".into()))
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Checks `secret` for `username`.
    ///
    /// # Returns
    /// - `Ok(User)`: the profile echoed back in the login result
    /// - `Err(SessionError::AuthFailed)`: unknown user or wrong secret
    fn authenticate(
        &self,
        username: &Username,
        secret: &str,
    ) -> impl Future<Output = Result<User, SessionError>> + Send;
}

/// An [`Authenticator`] backed by a fixed in-memory table.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    accounts: HashMap<Username, (String, User)>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account with the default `"online"` profile.
    pub fn with_user(self, username: &str, secret: &str) -> Self {
        self.with_profile(User::new(username), secret)
    }

    /// Adds an account with an explicit profile.
    pub fn with_profile(mut self, user: User, secret: &str) -> Self {
        self.accounts
            .insert(user.username.clone(), (secret.to_owned(), user));
        self
    }
}

impl Authenticator for StaticAuthenticator {
    async fn authenticate(
        &self,
        username: &Username,
        secret: &str,
    ) -> Result<User, SessionError> {
        match self.accounts.get(username) {
            Some((expected, user)) if expected == secret => Ok(user.clone()),
            Some(_) => Err(SessionError::AuthFailed(format!(
                "wrong secret for {username}"
            ))),
            None => {
                Err(SessionError::AuthFailed(format!("unknown user {username}")))
            }
        }
    }
}
