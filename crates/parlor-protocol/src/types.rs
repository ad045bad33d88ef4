//! Core protocol types for Parlor's wire format.
//!
//! Every record on the wire is one [`Envelope`]: five string fields, where
//! `message` is either plain text or itself a JSON document (a credential
//! pair, a user profile, a list of names). The field names and the
//! `type`/`subject` vocabulary below are fixed by deployed clients.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ProtocolError;

/// The `from` value used on every envelope the server originates.
pub const SERVER: &str = "server";

/// Values of the envelope's `type` field.
pub mod kind {
    /// Client → Server: `message` holds a `[username, secret]` pair.
    pub const CREDENTIALS: &str = "MSG-ARRAY";
    /// Server → Client: the answer to a login or a presence query.
    pub const RESULT: &str = "MSG-RESULT";
    /// Client → Client: point-to-point chat, `to` is a username.
    pub const USER_TO_USER: &str = "user_to_user";
    /// Client → Group: fan-out chat, `to` is a group name.
    pub const USER_TO_GROUP: &str = "user_to_group";
    /// Server → Client: unsolicited notices (welcome, status, goodbye).
    pub const SERVER_TO_CLIENT: &str = "server_to_client";
}

/// Values of the envelope's `subject` field.
pub mod subject {
    pub const WELCOME: &str = "welcome_message";
    pub const LOGIN: &str = "login_credentials";
    pub const ONLINE_USERS: &str = "online_users";
    pub const ALL_USERS: &str = "all_users";
    pub const SET_STATUS: &str = "set_status";
    pub const QUIT: &str = "quit";
    pub const HEARTBEAT: &str = "heartbeat";
    /// Misspelling sent by older clients; accepted as a heartbeat.
    pub const HEARTBEAT_LEGACY: &str = "hearbeat";
    pub const STATUS_CHANGE: &str = "user_status_change";
}

/// Login result payload for rejected credentials.
pub const LOGIN_FAILED: &str = "fail";
/// Login result payload when the username already has a live session.
pub const LOGIN_ALREADY_CONNECTED: &str = "already_connected";

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique username.
///
/// Newtype over `String` so a username can't be confused with a group
/// name or a status string in signatures. Serializes as a plain string.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Wraps a raw username.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrows the name as a `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Username {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for Username {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A user profile, as returned by the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: Username,
    /// Free-form presence status, e.g. `"online"` or `"away"`.
    pub status: String,
}

impl User {
    /// Creates a profile with the default `"online"` status.
    pub fn new(username: impl Into<Username>) -> Self {
        Self {
            username: username.into(),
            status: "online".to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level wire record.
///
/// ```text
/// { "from": "alice", "to": "bob", "type": "user_to_user",
///   "subject": "hi", "message": "are you there?" }
/// ```
///
/// Missing fields decode as empty strings: clients routinely omit the ones
/// a command doesn't use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    /// Coarse category; one of the [`kind`] constants.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Command or intent; usually one of the [`subject`] constants.
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

impl Envelope {
    /// Builds an envelope from its five fields.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        kind: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind: kind.into(),
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Server → Client greeting sent as soon as a connection is accepted.
    pub fn welcome() -> Self {
        Self::new(SERVER, "", kind::SERVER_TO_CLIENT, subject::WELCOME, "success")
    }

    /// Successful login: `message` carries the user's profile as JSON.
    pub fn login_success(user: &User) -> Result<Self, ProtocolError> {
        let profile =
            serde_json::to_string(user).map_err(ProtocolError::Encode)?;
        Ok(Self::new(
            SERVER,
            user.username.as_str(),
            kind::RESULT,
            subject::LOGIN,
            profile,
        ))
    }

    /// Rejected login. `reason` is [`LOGIN_FAILED`] or
    /// [`LOGIN_ALREADY_CONNECTED`].
    pub fn login_failure(to: &str, reason: &str) -> Self {
        Self::new(SERVER, to, kind::RESULT, subject::LOGIN, reason)
    }

    /// Answer to an online-users query: a JSON array of usernames.
    pub fn online_users(
        to: &Username,
        online: &[Username],
    ) -> Result<Self, ProtocolError> {
        let names =
            serde_json::to_string(online).map_err(ProtocolError::Encode)?;
        Ok(Self::new(
            SERVER,
            to.as_str(),
            kind::RESULT,
            subject::ONLINE_USERS,
            names,
        ))
    }

    /// Answer to an all-users query: a JSON array of user profiles.
    pub fn all_users(
        to: &Username,
        users: &[User],
    ) -> Result<Self, ProtocolError> {
        let profiles =
            serde_json::to_string(users).map_err(ProtocolError::Encode)?;
        Ok(Self::new(
            SERVER,
            to.as_str(),
            kind::RESULT,
            subject::ALL_USERS,
            profiles,
        ))
    }

    /// Broadcast notice that `username` changed status to `status`.
    pub fn status_change(username: &Username, status: &str) -> Self {
        Self::new(
            username.as_str(),
            "*",
            kind::SERVER_TO_CLIENT,
            subject::STATUS_CHANGE,
            status,
        )
    }

    /// Goodbye sent in reply to `quit`, right before the server closes.
    pub fn disconnect_ack(to: &Username) -> Self {
        Self::new(
            SERVER,
            to.as_str(),
            kind::SERVER_TO_CLIENT,
            subject::QUIT,
            "disconnecting...",
        )
    }

    /// Decodes the `message` field as JSON.
    ///
    /// Convenience for clients and tests reading nested payloads such as
    /// the profile inside a login result.
    pub fn message_as<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, ProtocolError> {
        serde_json::from_str(&self.message).map_err(ProtocolError::Decode)
    }
}

// =========================================================================
// Tests
// =========================================================================
