//! The registry: who is logged in, and how to reach them.
//!
//! # Concurrency
//!
//! One `tokio::sync::Mutex` guards the whole map. Every operation, reads
//! included, takes it, so an operation observes either all of a concurrent
//! `add`/`remove` or none of it. Deliveries enqueue onto the recipient's
//! outbox *while the lock is held*: once `remove` returns, no delivery can
//! still be holding that session's handle.
//!
//! The lock is never held across an `.await` on anything but the lock
//! itself; group resolution talks to the directory before locking.

use std::collections::{HashMap, HashSet};

use parlor_protocol::{Envelope, Username};
use parlor_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::{Directory, RegistryError, SessionHandle};

/// Maps each logged-in username to its live session.
///
/// Shared between sessions behind an `Arc`; never global.
///
/// ## Invariant
///
/// At most one entry per username. An entry exists exactly while the
/// owning session is authenticated and not yet terminated.
pub struct Registry<D: Directory> {
    sessions: Mutex<HashMap<Username, SessionHandle>>,
    directory: D,
}

impl<D: Directory> Registry<D> {
    /// Creates an empty registry backed by `directory`.
    pub fn new(directory: D) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            directory,
        }
    }

    /// The directory used for group resolution and user listings.
    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Registers a session under `username`.
    ///
    /// An entry whose session has already dropped its outbox is stale (the
    /// task died without deregistering) and is replaced.
    ///
    /// # Errors
    /// [`RegistryError::AlreadyRegistered`] if a live session already holds
    /// the username. The existing entry is left untouched.
    pub async fn add(
        &self,
        username: Username,
        handle: SessionHandle,
    ) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock().await;

        if let Some(existing) = sessions.get(&username) {
            if !existing.is_closed() {
                return Err(RegistryError::AlreadyRegistered(username));
            }
            tracing::debug!(
                %username,
                stale = %existing.connection_id(),
                "replacing stale registry entry"
            );
        }

        tracing::info!(
            %username,
            conn_id = %handle.connection_id(),
            online = sessions.len() + 1,
            "user registered"
        );
        sessions.insert(username, handle);
        Ok(())
    }

    /// Removes `username`'s entry, returning it if one existed.
    ///
    /// Removing an absent username is a no-op.
    pub async fn remove(&self, username: &Username) -> Option<SessionHandle> {
        let removed = self.sessions.lock().await.remove(username);
        if removed.is_some() {
            tracing::info!(%username, "user deregistered");
        }
        removed
    }

    /// Removes `username`'s entry only if it belongs to `connection_id`.
    ///
    /// Session teardown uses this so a late cleanup can never evict a
    /// different, newer session for the same user.
    pub async fn remove_session(
        &self,
        username: &Username,
        connection_id: ConnectionId,
    ) -> bool {
        let mut sessions = self.sessions.lock().await;
        let owned = sessions
            .get(username)
            .is_some_and(|h| h.connection_id() == connection_id);
        if owned {
            sessions.remove(username);
            tracing::info!(%username, %connection_id, "user deregistered");
        }
        owned
    }

    /// Returns a handle to `username`'s session, if they are online.
    pub async fn lookup(&self, username: &Username) -> Option<SessionHandle> {
        self.sessions.lock().await.get(username).cloned()
    }

    /// Returns `true` if `username` is online.
    pub async fn contains(&self, username: &Username) -> bool {
        self.sessions.lock().await.contains_key(username)
    }

    /// A sorted, point-in-time copy of every online username.
    pub async fn snapshot_online(&self) -> Vec<Username> {
        let mut online: Vec<Username> =
            self.sessions.lock().await.keys().cloned().collect();
        online.sort();
        online
    }

    /// Delivers `envelope` unchanged to the user named in its `to` field.
    ///
    /// Returns `true` if it was enqueued. An offline recipient is not an
    /// error: the envelope is dropped and `false` is returned.
    pub async fn send_to_user(&self, envelope: &Envelope) -> bool {
        let recipient = Username::new(envelope.to.as_str());
        let sessions = self.sessions.lock().await;
        let delivered = sessions
            .get(&recipient)
            .is_some_and(|h| h.deliver(envelope.clone()));
        if !delivered {
            tracing::debug!(
                from = %envelope.from,
                to = %recipient,
                "recipient offline, message dropped"
            );
        }
        delivered
    }

    /// Delivers `envelope` unchanged to every online member of the group
    /// named in its `to` field.
    ///
    /// Offline members are skipped; a member listed twice receives one
    /// copy. Returns the number of sessions reached.
    ///
    /// # Errors
    /// [`RegistryError::Directory`] if the group cannot be resolved.
    pub async fn send_to_group(
        &self,
        envelope: &Envelope,
    ) -> Result<usize, RegistryError> {
        let members = self.directory.group_members(&envelope.to).await?;

        let sessions = self.sessions.lock().await;
        let mut seen = HashSet::with_capacity(members.len());
        let delivered = members
            .iter()
            .filter(|m| seen.insert(*m))
            .filter_map(|m| sessions.get(m))
            .filter(|h| h.deliver(envelope.clone()))
            .count();

        tracing::debug!(
            from = %envelope.from,
            group = %envelope.to,
            members = members.len(),
            delivered,
            "group message fanned out"
        );
        Ok(delivered)
    }

    /// Delivers `envelope` to every online session accepted by `predicate`.
    ///
    /// Returns the number of sessions reached.
    pub async fn broadcast<F>(&self, envelope: &Envelope, predicate: F) -> usize
    where
        F: Fn(&SessionHandle) -> bool + Send,
    {
        let sessions = self.sessions.lock().await;
        sessions
            .values()
            .filter(|h| predicate(*h))
            .filter(|h| h.deliver(envelope.clone()))
            .count()
    }

    /// Delivers `envelope` to every online session.
    pub async fn broadcast_all(&self, envelope: &Envelope) -> usize {
        self.broadcast(envelope, |_| true).await
    }

    /// Number of online users.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Returns `true` if nobody is online.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
