//! The per-connection session task.
//!
//! A [`Session`] owns one [`Connection`] from accept to close. Its
//! [`run`](Session::run) loop is the only code that ever writes to that
//! connection: direct replies are written inline, and deliveries from
//! other sessions arrive through the session's outbox and are drained by
//! the same loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parlor_protocol::{
    Codec, Command, Envelope, JsonCodec, User, Username,
    LOGIN_ALREADY_CONNECTED, LOGIN_FAILED,
};
use parlor_registry::{Directory, Outbox, Registry, SessionHandle};
use parlor_transport::{Connection, ConnectionId, TransportError};
use tokio::sync::mpsc;

use crate::heartbeat::Heartbeat;
use crate::{Authenticator, SessionError};

/// Idle time after which a silent client is disconnected.
pub const DEFAULT_HEARTBEAT_WINDOW: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Configuration and shared context
// ---------------------------------------------------------------------------

/// Tunables for every session a server spawns.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a session may go without receiving any record before it
    /// is terminated.
    ///
    /// Default: [`DEFAULT_HEARTBEAT_WINDOW`] (10 seconds).
    pub heartbeat_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_window: DEFAULT_HEARTBEAT_WINDOW,
        }
    }
}

/// Everything a session shares with its siblings.
///
/// Built once by the server and handed to each session behind an `Arc`.
pub struct SessionContext<A, D, K = JsonCodec>
where
    A: Authenticator,
    D: Directory,
    K: Codec,
{
    pub authenticator: A,
    pub registry: Arc<Registry<D>>,
    pub codec: K,
    pub config: SessionConfig,
}

impl<A, D, K> SessionContext<A, D, K>
where
    A: Authenticator,
    D: Directory,
    K: Codec,
{
    pub fn new(
        authenticator: A,
        registry: Arc<Registry<D>>,
        codec: K,
        config: SessionConfig,
    ) -> Self {
        Self {
            authenticator,
            registry,
            codec,
            config,
        }
    }
}

// ---------------------------------------------------------------------------
// States and outcomes
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
///
/// ```text
///   Unauthenticated ──(login ok)──→ Authenticated ──→ Terminated
///         └───────────────────────────────────────────────↗
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, welcome sent, waiting for valid credentials.
    Unauthenticated,
    /// Logged in and present in the registry.
    Authenticated,
    /// Deregistered and closed. Terminal.
    Terminated,
}

/// Why [`Session::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// No record arrived within the heartbeat window.
    HeartbeatTimeout,
    /// The client sent `quit`.
    Quit,
    /// The client closed the connection.
    PeerClosed,
    /// Reading from or writing to the connection failed.
    TransportFailure,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HeartbeatTimeout => "heartbeat timeout",
            Self::Quit => "quit",
            Self::PeerClosed => "peer closed",
            Self::TransportFailure => "transport failure",
        };
        f.write_str(s)
    }
}

/// What the loop should do after handling one record.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// The branch of the select loop that fired.
enum Event {
    Expired,
    Received(Result<Option<Vec<u8>>, TransportError>),
    Outbound(Envelope),
}

// ---------------------------------------------------------------------------
// Registration guard
// ---------------------------------------------------------------------------

/// Proof that this session holds a registry entry.
///
/// Released explicitly on normal termination. If the session is dropped
/// without terminating (its task was aborted or panicked), `Drop` spawns
/// the removal instead, since the registry lock is async.
struct Registration<D: Directory> {
    registry: Arc<Registry<D>>,
    username: Username,
    connection_id: ConnectionId,
    released: bool,
}

impl<D: Directory> Registration<D> {
    async fn release(mut self) {
        self.registry
            .remove_session(&self.username, self.connection_id)
            .await;
        self.released = true;
    }
}

impl<D: Directory> Drop for Registration<D> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let registry = Arc::clone(&self.registry);
        let username = self.username.clone();
        let connection_id = self.connection_id;
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                registry.remove_session(&username, connection_id).await;
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One client connection's state machine.
pub struct Session<C, A, D, K = JsonCodec>
where
    C: Connection<Error = TransportError>,
    A: Authenticator,
    D: Directory,
    K: Codec,
{
    conn: C,
    ctx: Arc<SessionContext<A, D, K>>,
    state: SessionState,
    user: Option<User>,
    heartbeat: Heartbeat,
    outbox_tx: mpsc::UnboundedSender<Envelope>,
    outbox: Outbox,
    registration: Option<Registration<D>>,
}

impl<C, A, D, K> Session<C, A, D, K>
where
    C: Connection<Error = TransportError>,
    A: Authenticator,
    D: Directory,
    K: Codec,
{
    /// Creates a session for a freshly accepted connection and arms its
    /// heartbeat deadline.
    pub fn new(conn: C, ctx: Arc<SessionContext<A, D, K>>) -> Self {
        let heartbeat = Heartbeat::arm(ctx.config.heartbeat_window);
        let (outbox_tx, outbox) = mpsc::unbounded_channel();
        Self {
            conn,
            ctx,
            state: SessionState::Unauthenticated,
            user: None,
            heartbeat,
            outbox_tx,
            outbox,
            registration: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The authenticated profile, once login has succeeded.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Runs the session until it terminates, then tears it down.
    ///
    /// On return the session is out of the registry and the connection
    /// has been closed.
    pub async fn run(mut self) -> TerminationReason {
        let conn_id = self.conn.id();
        tracing::debug!(%conn_id, "session started");

        let reason = self.drive().await;
        self.terminate().await;

        match &self.user {
            Some(user) => tracing::info!(
                %conn_id,
                username = %user.username,
                %reason,
                "session terminated"
            ),
            None => tracing::info!(%conn_id, %reason, "session terminated"),
        }
        reason
    }

    async fn drive(&mut self) -> TerminationReason {
        if let Err(e) = self.send(&Envelope::welcome()).await {
            tracing::debug!(
                conn_id = %self.conn.id(), error = %e, "failed to send welcome"
            );
            return TerminationReason::TransportFailure;
        }

        loop {
            // Deadline first: if a record and the deadline are ready at the
            // same poll, the session is already expired.
            let event = tokio::select! {
                biased;
                () = self.heartbeat.expired() => Event::Expired,
                received = self.conn.recv() => Event::Received(received),
                Some(envelope) = self.outbox.recv() => Event::Outbound(envelope),
            };

            match event {
                Event::Expired => {
                    tracing::info!(
                        conn_id = %self.conn.id(),
                        window = ?self.ctx.config.heartbeat_window,
                        "heartbeat window elapsed"
                    );
                    return TerminationReason::HeartbeatTimeout;
                }
                Event::Received(Ok(None)) => {
                    return TerminationReason::PeerClosed;
                }
                Event::Received(Err(e)) => {
                    tracing::debug!(
                        conn_id = %self.conn.id(), error = %e, "recv error"
                    );
                    return TerminationReason::TransportFailure;
                }
                Event::Received(Ok(Some(data))) => {
                    self.heartbeat.reset();
                    match self.handle_record(&data).await {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Quit) => return TerminationReason::Quit,
                        Err(e) => {
                            if let Some(reason) = self.recover(e) {
                                return reason;
                            }
                        }
                    }
                }
                Event::Outbound(envelope) => {
                    if let Err(e) = self.send(&envelope).await {
                        if let Some(reason) = self.recover(e) {
                            return reason;
                        }
                    }
                }
            }
        }
    }

    /// Logs a non-fatal error, or returns the reason to stop on a fatal one.
    fn recover(&self, error: SessionError) -> Option<TerminationReason> {
        match error {
            SessionError::Transport(e) => {
                tracing::debug!(
                    conn_id = %self.conn.id(), error = %e, "send error"
                );
                Some(TerminationReason::TransportFailure)
            }
            other => {
                tracing::warn!(
                    conn_id = %self.conn.id(),
                    error = %other,
                    "error handling record"
                );
                None
            }
        }
    }

    async fn handle_record(&mut self, data: &[u8]) -> Result<Flow, SessionError> {
        let envelope: Envelope = match self.ctx.codec.decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(
                    conn_id = %self.conn.id(),
                    error = %e,
                    "failed to decode envelope"
                );
                return Ok(Flow::Continue);
            }
        };

        let command = match Command::parse(&envelope) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(
                    conn_id = %self.conn.id(),
                    error = %e,
                    "ignoring unrecognized envelope"
                );
                return Ok(Flow::Continue);
            }
        };

        match self.state {
            SessionState::Unauthenticated => self.handle_login(command).await,
            SessionState::Authenticated => {
                self.dispatch(command, &envelope).await
            }
            SessionState::Terminated => Ok(Flow::Quit),
        }
    }

    // --- Unauthenticated ---

    async fn handle_login(
        &mut self,
        command: Command,
    ) -> Result<Flow, SessionError> {
        let Command::Login { username, secret } = command else {
            tracing::debug!(
                conn_id = %self.conn.id(),
                "ignoring command before login"
            );
            return Ok(Flow::Continue);
        };

        let user = match self
            .ctx
            .authenticator
            .authenticate(&username, &secret)
            .await
        {
            Ok(user) => user,
            Err(e) => {
                tracing::info!(
                    conn_id = %self.conn.id(),
                    %username,
                    error = %e,
                    "login rejected"
                );
                self.send(&Envelope::login_failure(
                    username.as_str(),
                    LOGIN_FAILED,
                ))
                .await?;
                return Ok(Flow::Continue);
            }
        };

        let reply = Envelope::login_success(&user)?;
        let connection_id = self.conn.id();
        let handle = SessionHandle::new(
            connection_id,
            user.username.clone(),
            self.outbox_tx.clone(),
        );

        if let Err(e) =
            self.ctx.registry.add(user.username.clone(), handle).await
        {
            tracing::info!(
                conn_id = %connection_id,
                username = %user.username,
                error = %e,
                "duplicate login rejected"
            );
            self.send(&Envelope::login_failure(
                user.username.as_str(),
                LOGIN_ALREADY_CONNECTED,
            ))
            .await?;
            return Ok(Flow::Continue);
        }

        self.registration = Some(Registration {
            registry: Arc::clone(&self.ctx.registry),
            username: user.username.clone(),
            connection_id,
            released: false,
        });
        self.state = SessionState::Authenticated;
        tracing::info!(
            conn_id = %connection_id,
            username = %user.username,
            "user authenticated"
        );
        self.user = Some(user);

        self.send(&reply).await?;
        Ok(Flow::Continue)
    }

    // --- Authenticated ---

    async fn dispatch(
        &mut self,
        command: Command,
        envelope: &Envelope,
    ) -> Result<Flow, SessionError> {
        let Some(username) = self.user.as_ref().map(|u| u.username.clone())
        else {
            return Ok(Flow::Continue);
        };
        let registry = Arc::clone(&self.ctx.registry);

        match command {
            Command::Heartbeat => {}
            Command::Direct { .. } => {
                registry.send_to_user(envelope).await;
            }
            Command::Group { group } => {
                if let Err(e) = registry.send_to_group(envelope).await {
                    tracing::warn!(
                        from = %username,
                        %group,
                        error = %e,
                        "group delivery failed"
                    );
                }
            }
            Command::OnlineUsers => {
                let online = registry.snapshot_online().await;
                self.send(&Envelope::online_users(&username, &online)?)
                    .await?;
            }
            Command::AllUsers => match registry.directory().all_users().await {
                Ok(users) => {
                    self.send(&Envelope::all_users(&username, &users)?)
                        .await?;
                }
                Err(e) => tracing::warn!(
                    %username,
                    error = %e,
                    "directory listing failed"
                ),
            },
            Command::SetStatus { status } => {
                if let Some(user) = self.user.as_mut() {
                    user.status.clone_from(&status);
                }
                let notified = registry
                    .broadcast_all(&Envelope::status_change(&username, &status))
                    .await;
                tracing::debug!(%username, %status, notified, "status changed");
            }
            Command::Quit => {
                self.send(&Envelope::disconnect_ack(&username)).await?;
                return Ok(Flow::Quit);
            }
            Command::Login { .. } => {
                tracing::debug!(%username, "ignoring login while authenticated");
            }
        }

        Ok(Flow::Continue)
    }

    // --- Teardown ---

    /// Deregisters, closes the outbox, then closes the connection.
    ///
    /// Every step after the first call is a no-op.
    async fn terminate(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }
        self.state = SessionState::Terminated;

        if let Some(registration) = self.registration.take() {
            registration.release().await;
        }
        self.outbox.close();

        if let Err(e) = self.conn.close().await {
            tracing::debug!(
                conn_id = %self.conn.id(),
                error = %e,
                "error closing connection"
            );
        }
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), SessionError> {
        let bytes = self.ctx.codec.encode(envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticAuthenticator;
    use parlor_registry::MemoryDirectory;
    use parlor_transport::MemoryConnection;

    type TestSession =
        Session<MemoryConnection, StaticAuthenticator, MemoryDirectory>;

    fn context() -> Arc<SessionContext<StaticAuthenticator, MemoryDirectory>> {
        Arc::new(SessionContext::new(
            StaticAuthenticator::new().with_user("alice", "correctpass"),
            Arc::new(Registry::new(MemoryDirectory::new())),
            JsonCodec,
            SessionConfig::default(),
        ))
    }

    fn login_record() -> Vec<u8> {
        JsonCodec
            .encode(&Envelope::new(
                "",
                "",
                "MSG-ARRAY",
                "login_credentials",
                r#"["alice","correctpass"]"#,
            ))
            .unwrap()
    }

    #[test]
    fn test_default_config_window_is_ten_seconds() {
        assert_eq!(
            SessionConfig::default().heartbeat_window,
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_termination_reason_display() {
        assert_eq!(
            TerminationReason::HeartbeatTimeout.to_string(),
            "heartbeat timeout"
        );
        assert_eq!(TerminationReason::Quit.to_string(), "quit");
    }

    #[tokio::test]
    async fn test_new_session_starts_unauthenticated() {
        let (server, _client) = MemoryConnection::pair();
        let session: TestSession = Session::new(server, context());
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn test_login_registers_and_authenticates() {
        let ctx = context();
        let (server, _client) = MemoryConnection::pair();
        let mut session: TestSession = Session::new(server, Arc::clone(&ctx));

        let flow = session.handle_record(&login_record()).await.unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(session.state(), SessionState::Authenticated);
        assert!(ctx.registry.contains(&Username::new("alice")).await);
    }

    #[tokio::test]
    async fn test_non_login_before_auth_is_ignored() {
        let ctx = context();
        let (server, _client) = MemoryConnection::pair();
        let mut session: TestSession = Session::new(server, Arc::clone(&ctx));

        let record = JsonCodec
            .encode(&Envelope::new("alice", "bob", "user_to_user", "", "hi"))
            .unwrap();
        let flow = session.handle_record(&record).await.unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(ctx.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_terminate_twice_deregisters_once() {
        let ctx = context();
        let (server, _client) = MemoryConnection::pair();
        let mut session: TestSession = Session::new(server, Arc::clone(&ctx));
        session.handle_record(&login_record()).await.unwrap();

        session.terminate().await;
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(ctx.registry.is_empty().await);

        // A newer session takes the name; a repeated terminate must not
        // evict it.
        let (handle, _outbox) =
            SessionHandle::channel(ConnectionId::next(), Username::new("alice"));
        ctx.registry
            .add(Username::new("alice"), handle)
            .await
            .unwrap();

        session.terminate().await;
        assert!(ctx.registry.contains(&Username::new("alice")).await);
    }

    #[tokio::test]
    async fn test_dropping_registered_session_deregisters() {
        let ctx = context();
        let (server, _client) = MemoryConnection::pair();
        let mut session: TestSession = Session::new(server, Arc::clone(&ctx));
        session.handle_record(&login_record()).await.unwrap();
        assert_eq!(ctx.registry.len().await, 1);

        drop(session);

        // The removal runs on a spawned task.
        for _ in 0..10 {
            if ctx.registry.is_empty().await {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(ctx.registry.is_empty().await);
    }
}
