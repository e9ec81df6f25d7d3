//! TCP implementation of the line-oriented transport.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::{ConnectionId, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP listener producing [`LineConnection`]s.
///
/// Owned by the session host for the duration of the accept phase;
/// dropping it stops listening, which is how the host "closes the
/// welcoming socket" once the expected peers have joined.
pub struct TcpLineTransport {
    listener: TcpListener,
}

impl TcpLineTransport {
    /// Binds a listening socket to the given address.
    ///
    /// # Errors
    /// Returns [`TransportError::BindFailed`] if the socket cannot be
    /// bound; this is fatal at session start.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "line transport listening");
        Ok(Self { listener })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for and accepts the next incoming connection.
    pub async fn accept(&self) -> Result<LineConnection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let conn = LineConnection::from_stream(stream);
        tracing::debug!(id = %conn.id(), %addr, "accepted connection");
        Ok(conn)
    }
}

/// A line-based duplex channel over one TCP stream.
///
/// Shared by both sides of the protocol: the host wraps accepted
/// sockets in one, a remote peer wraps its single upstream socket.
///
/// The writer half is acquired once and kept for the lifetime of the
/// connection, behind a mutex so concurrent senders (handler task,
/// broadcast path) never interleave partial lines. The reader half has
/// a single consumer per the task-per-connection model but is guarded
/// the same way.
pub struct LineConnection {
    id: ConnectionId,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
}

impl LineConnection {
    /// Connects to a session host at the given address.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectFailed`] if the TCP connection
    /// cannot be established.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        let conn = Self::from_stream(stream);
        tracing::debug!(id = %conn.id(), addr, "connected to host");
        Ok(conn)
    }

    fn from_stream(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        Self {
            id,
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(write_half),
        }
    }

    /// Writes one message as a newline-terminated line and flushes it.
    ///
    /// # Errors
    /// Returns [`TransportError::SendFailed`] on write failure; the
    /// caller is expected to close and discard the connection.
    pub async fn send_line(&self, line: &str) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(TransportError::SendFailed)?;
        writer
            .write_all(b"\n")
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    /// Reads the next line, with the trailing newline (and any `\r`)
    /// stripped.
    ///
    /// Returns `Ok(None)` on clean end-of-stream. There is no read
    /// timeout: a silent peer blocks its reader indefinitely.
    pub async fn recv_line(&self) -> Result<Option<String>, TransportError> {
        let mut reader = self.reader.lock().await;
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Shuts down the write half, signalling end-of-stream to the peer.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}
