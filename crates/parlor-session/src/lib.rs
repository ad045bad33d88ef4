//! Client session management for Parlor.
//!
//! This crate owns the life of one client connection:
//!
//! 1. **Authentication**: validating who a client is ([`Authenticator`])
//! 2. **Dispatch**: turning each inbound envelope into a registry
//!    operation or a reply ([`Session`])
//! 3. **Heartbeat**: terminating clients that go quiet for longer than
//!    [`SessionConfig::heartbeat_window`]
//!
//! # State machine
//!
//! ```text
//!   Unauthenticated ──(valid credentials)──→ Authenticated
//!         │                                       │
//!         └──(timeout / peer close / io error)────┴──(quit)──→ Terminated
//! ```
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)          ← accepts connections, spawns Session::run
//!     ↕
//! Session (this crate)    ← handshake, heartbeat, dispatch
//!     ↕
//! Registry / Protocol / Transport (below)
//! ```

mod auth;
mod error;
mod heartbeat;
mod session;

pub use auth::{Authenticator, StaticAuthenticator};
pub use error::SessionError;
pub use session::{
    Session, SessionConfig, SessionContext, SessionState, TerminationReason,
    DEFAULT_HEARTBEAT_WINDOW,
};
