//! Wire protocol for Parlor.
//!
//! This crate defines the "language" that chat clients and the relay speak:
//!
//! - **Types** ([`Envelope`], [`User`], [`Username`]): the records that
//!   travel on the wire.
//! - **Commands** ([`Command`]): the closed set of intents an inbound
//!   envelope decodes to. The wire format is loosely typed (every field is
//!   a string); decoding happens once, here, and everything downstream
//!   matches on the enum.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (records) → Protocol (Envelope → Command) → Session (dispatch)
//! ```

mod codec;
mod command;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use command::Command;
pub use error::ProtocolError;
pub use types::{
    kind, subject, Envelope, User, Username, LOGIN_ALREADY_CONNECTED,
    LOGIN_FAILED, SERVER,
};
