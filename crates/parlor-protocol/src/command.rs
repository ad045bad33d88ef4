//! Decoding inbound envelopes into typed commands.
//!
//! The wire format spreads intent across `type`, `subject` and sometimes
//! `message`. [`Command::parse`] is the only place that looks at those
//! strings; rules are checked in order and the first match wins:
//!
//! 1. `type = MSG-ARRAY` → [`Command::Login`]
//! 2. `subject = heartbeat` (or the legacy `hearbeat`) → [`Command::Heartbeat`]
//! 3. `subject` names a query or control verb → that command
//! 4. `type = user_to_group` → [`Command::Group`]
//! 5. `type` or `subject` is `user_to_user` → a presence keyword
//!    `message` (`online_users`, `all_users`) selects that query,
//!    anything else, `quit` included, is a [`Command::Direct`] message
//! 6. `message` is a presence keyword or `quit` → that command
//! 7. otherwise → [`ProtocolError::InvalidMessage`]
//!
//! Keywords in `subject` and `message` match case-insensitively. The
//! `type` values and the `user_to_user` marker match exactly.

use crate::types::{kind, subject};
use crate::{Envelope, ProtocolError, Username};

/// What a client asked the server to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Credential submission.
    Login { username: Username, secret: String },
    /// Keep-alive; carries no payload.
    Heartbeat,
    /// Deliver the envelope unchanged to one user.
    Direct { to: Username },
    /// Deliver the envelope unchanged to every online member of a group.
    Group { group: String },
    /// List the usernames that currently have a live session.
    OnlineUsers,
    /// List every user the directory knows about.
    AllUsers,
    /// Change the sender's presence status.
    SetStatus { status: String },
    /// Disconnect.
    Quit,
}

impl Command {
    /// Decodes the command carried by `envelope`.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] when no rule matches, or when a
    /// credential submission's payload isn't a two-string JSON array.
    pub fn parse(envelope: &Envelope) -> Result<Self, ProtocolError> {
        if envelope.kind == kind::CREDENTIALS {
            return parse_credentials(&envelope.message);
        }

        let verb = envelope.subject.to_ascii_lowercase();
        match verb.as_str() {
            subject::HEARTBEAT | subject::HEARTBEAT_LEGACY => {
                return Ok(Self::Heartbeat);
            }
            subject::ONLINE_USERS => return Ok(Self::OnlineUsers),
            subject::ALL_USERS => return Ok(Self::AllUsers),
            subject::SET_STATUS => {
                return Ok(Self::SetStatus {
                    status: envelope.message.clone(),
                });
            }
            subject::QUIT => return Ok(Self::Quit),
            _ => {}
        }

        if envelope.kind == kind::USER_TO_GROUP {
            return Ok(Self::Group {
                group: envelope.to.clone(),
            });
        }

        if envelope.kind == kind::USER_TO_USER
            || envelope.subject == kind::USER_TO_USER
        {
            return Ok(presence_query(&envelope.message).unwrap_or_else(
                || Self::Direct {
                    to: Username::new(envelope.to.as_str()),
                },
            ));
        }

        if let Some(query) = presence_query(&envelope.message) {
            return Ok(query);
        }
        if envelope.message.eq_ignore_ascii_case(subject::QUIT) {
            return Ok(Self::Quit);
        }

        Err(ProtocolError::InvalidMessage(format!(
            "unrecognized envelope: type={:?} subject={:?}",
            envelope.kind, envelope.subject
        )))
    }
}

impl TryFrom<&Envelope> for Command {
    type Error = ProtocolError;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Self::parse(envelope)
    }
}

fn presence_query(message: &str) -> Option<Command> {
    if message.eq_ignore_ascii_case(subject::ONLINE_USERS) {
        Some(Command::OnlineUsers)
    } else if message.eq_ignore_ascii_case(subject::ALL_USERS) {
        Some(Command::AllUsers)
    } else {
        None
    }
}

fn parse_credentials(message: &str) -> Result<Command, ProtocolError> {
    // A JSON array of exactly two strings deserializes into a 2-tuple;
    // any other length or element type is rejected.
    let (username, secret): (String, String) = serde_json::from_str(message)
        .map_err(|e| {
            ProtocolError::InvalidMessage(format!(
                "credentials must be [username, secret]: {e}"
            ))
        })?;
    Ok(Command::Login {
        username: Username::new(username),
        secret,
    })
}
