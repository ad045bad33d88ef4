//! Plain TCP transport with newline-delimited records.
//!
//! Each record is one line of text terminated by `\n`. A trailing `\r`
//! is stripped so telnet-style clients work. Outgoing records must not
//! contain a raw newline; JSON envelopes never do, since `serde_json`
//! escapes control characters inside strings.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Upper bound on a single inbound line, in bytes.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// A TCP [`Transport`] framing one record per line.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener })
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::next();
        tracing::debug!(%id, %addr, "accepted TCP connection");
        Ok(TcpConnection::from_stream(id, stream))
    }

    fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A single line-framed TCP connection.
pub struct TcpConnection {
    id: ConnectionId,
    reader: Mutex<LineReader>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpConnection {
    /// Wraps an already-connected stream.
    pub fn from_stream(id: ConnectionId, stream: tokio::net::TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            id,
            reader: Mutex::new(LineReader {
                half: read,
                pending: Vec::new(),
            }),
            writer: Mutex::new(write),
        }
    }
}

/// Read half plus the bytes received but not yet returned as a line.
struct LineReader {
    half: OwnedReadHalf,
    pending: Vec<u8>,
}

impl LineReader {
    /// Pops the next complete line off `pending`, without its terminator.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.pending.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.extend_from_slice(data);
        frame.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&frame)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        loop {
            if let Some(line) = reader.take_line() {
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(line));
            }
            if reader.pending.len() >= MAX_LINE_BYTES {
                return Err(TransportError::FrameTooLarge(
                    reader.pending.len(),
                ));
            }

            // `read` into a local chunk is cancel-safe: bytes only reach
            // `pending` once the read has completed.
            let mut chunk = [0u8; 4096];
            let n = reader
                .half
                .read(&mut chunk)
                .await
                .map_err(TransportError::ReceiveFailed)?;
            if n == 0 {
                // EOF. A partial last line is discarded.
                return Ok(None);
            }
            reader.pending.extend_from_slice(&chunk[..n]);
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
