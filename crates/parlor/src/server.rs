//! `ParlorServer` builder and accept loop.
//!
//! Ties the layers together: a transport accepts connections, and each
//! connection gets its own [`Session`] task sharing one
//! [`SessionContext`] (authenticator, registry, codec, config).

use std::sync::Arc;

use parlor_protocol::{Codec, JsonCodec};
use parlor_registry::{Directory, Registry};
use parlor_session::{Authenticator, Session, SessionConfig, SessionContext};
use parlor_transport::{
    Connection, TcpTransport, Transport, TransportError, WebSocketTransport,
};

use crate::ParlorError;

/// Builder for configuring and starting a Parlor server.
///
/// # Example
///
/// ```rust,ignore
/// let server = ParlorServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .session_config(SessionConfig {
///         heartbeat_window: Duration::from_secs(30),
///     })
///     .build(auth, directory)
///     .await?;
/// server.run().await
/// ```
pub struct ParlorServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
}

impl ParlorServerBuilder {
    /// Creates a builder bound to `127.0.0.1:8080` with default sessions.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Binds a WebSocket listener: one envelope per WebSocket message.
    pub async fn build<A, D>(
        self,
        auth: A,
        directory: D,
    ) -> Result<ParlorServer<WebSocketTransport, A, D>, ParlorError>
    where
        A: Authenticator,
        D: Directory,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        Ok(ParlorServer::new(transport, self.context(auth, directory)))
    }

    /// Binds a plain TCP listener: one envelope per line.
    pub async fn build_tcp<A, D>(
        self,
        auth: A,
        directory: D,
    ) -> Result<ParlorServer<TcpTransport, A, D>, ParlorError>
    where
        A: Authenticator,
        D: Directory,
    {
        let transport = TcpTransport::bind(&self.bind_addr).await?;
        Ok(ParlorServer::new(transport, self.context(auth, directory)))
    }

    fn context<A, D>(
        self,
        auth: A,
        directory: D,
    ) -> Arc<SessionContext<A, D>>
    where
        A: Authenticator,
        D: Directory,
    {
        Arc::new(SessionContext::new(
            auth,
            Arc::new(Registry::new(directory)),
            JsonCodec,
            self.session_config,
        ))
    }
}

impl Default for ParlorServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Parlor server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ParlorServer<T, A, D, K = JsonCodec>
where
    T: Transport,
    A: Authenticator,
    D: Directory,
    K: Codec,
{
    transport: T,
    ctx: Arc<SessionContext<A, D, K>>,
}

impl<T, A, D, K> ParlorServer<T, A, D, K>
where
    T: Transport,
    T::Connection: Connection<Error = TransportError>,
    A: Authenticator,
    D: Directory,
    K: Codec,
{
    /// Wraps an already-bound transport and a prepared context.
    ///
    /// Use this for custom codecs or transports; the builder covers the
    /// common cases.
    pub fn new(transport: T, ctx: Arc<SessionContext<A, D, K>>) -> Self {
        Self { transport, ctx }
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry shared by every session this server spawns.
    pub fn registry(&self) -> &Arc<Registry<D>> {
        &self.ctx.registry
    }

    /// Runs the accept loop.
    ///
    /// Spawns a session task per accepted connection. A failed accept is
    /// logged and the loop keeps going; it runs until the process exits.
    pub async fn run(mut self) -> Result<(), ParlorError> {
        match self.transport.local_addr() {
            Ok(addr) => tracing::info!(%addr, "Parlor server listening"),
            Err(_) => tracing::info!("Parlor server running"),
        }

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let conn_id = conn.id();
                    tracing::debug!(%conn_id, "connection accepted");
                    let session = Session::new(conn, Arc::clone(&self.ctx));
                    tokio::spawn(session.run());
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
