//! Routing handles: how the registry reaches a session without owning it.

use parlor_protocol::{Envelope, Username};
use parlor_transport::ConnectionId;
use tokio::sync::mpsc;

/// Receiving end of a session's outbound queue.
///
/// Drained by the session task, which writes each envelope to its own
/// transport. Every delivery for a session funnels through here, so the
/// transport only ever has one writer.
pub type Outbox = mpsc::UnboundedReceiver<Envelope>;

/// A non-owning handle to a live session.
///
/// Cloning is cheap (an `mpsc::UnboundedSender` clone). If the session has
/// already terminated, [`deliver`](Self::deliver) returns `false` and the
/// envelope is dropped; a stale handle can never write to a closed
/// transport.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    connection_id: ConnectionId,
    username: Username,
    sender: mpsc::UnboundedSender<Envelope>,
}

impl SessionHandle {
    /// Creates a handle and the outbox it feeds.
    pub fn channel(
        connection_id: ConnectionId,
        username: Username,
    ) -> (Self, Outbox) {
        let (sender, outbox) = mpsc::unbounded_channel();
        let handle = Self {
            connection_id,
            username,
            sender,
        };
        (handle, outbox)
    }

    /// Creates a handle that feeds an existing outbox sender.
    pub fn new(
        connection_id: ConnectionId,
        username: Username,
        sender: mpsc::UnboundedSender<Envelope>,
    ) -> Self {
        Self {
            connection_id,
            username,
            sender,
        }
    }

    /// The connection this session owns.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// The username the session authenticated as.
    pub fn username(&self) -> &Username {
        &self.username
    }

    /// Enqueues an envelope for the session to write.
    ///
    /// Never blocks. Returns `false` if the session is gone.
    pub fn deliver(&self, envelope: Envelope) -> bool {
        self.sender.send(envelope).is_ok()
    }

    /// Returns `true` once the session has dropped its outbox.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
