//! # Parlor
//!
//! Multi-user real-time text relay.
//!
//! Clients connect, log in with a username and secret, and exchange
//! envelopes: direct messages, group messages, presence queries and
//! status changes. Every connection is one task that owns its own
//! heartbeat deadline; a shared [`Registry`] maps logged-in usernames to
//! their sessions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parlor::prelude::*;
//!
//! # async fn start() -> Result<(), ParlorError> {
//! let auth = StaticAuthenticator::new().with_user("alice", "correctpass");
//! let directory = MemoryDirectory::new().with_user(User::new("alice"));
//!
//! let server = ParlorServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(auth, directory)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod server;

pub use error::ParlorError;
pub use server::{ParlorServer, ParlorServerBuilder};

pub use parlor_registry::Registry;

/// Everything needed to stand up a server and talk to it.
pub mod prelude {
    pub use crate::{ParlorError, ParlorServer, ParlorServerBuilder};

    pub use parlor_protocol::{
        kind, subject, Codec, Command, Envelope, JsonCodec, ProtocolError,
        User, Username,
    };
    pub use parlor_registry::{
        Directory, MemoryDirectory, Registry, RegistryError, SessionHandle,
    };
    pub use parlor_session::{
        Authenticator, SessionConfig, SessionError, StaticAuthenticator,
        TerminationReason,
    };
    pub use parlor_transport::{
        Connection, ConnectionId, TcpTransport, Transport, TransportError,
        WebSocketTransport,
    };
}
