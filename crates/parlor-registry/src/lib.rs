//! The shared session registry for Parlor.
//!
//! Every authenticated session has exactly one entry here, keyed by
//! username. The registry is how sessions find each other: it answers
//! presence queries and routes direct, group and broadcast envelopes.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session Layer (above)  ← registers on login, deregisters on termination
//!     ↕
//! Registry (this crate)  ← username → SessionHandle, fan-out delivery
//!     ↕
//! Protocol Layer (below) ← Username, User, Envelope
//! ```
//!
//! The registry never owns a session. It holds a [`SessionHandle`], a
//! cheap clonable sender into the session's outbound queue; the session's
//! own task performs every transport write.

mod directory;
mod error;
mod handle;
mod registry;

pub use directory::{Directory, MemoryDirectory};
pub use error::RegistryError;
pub use handle::{Outbox, SessionHandle};
pub use registry::Registry;
