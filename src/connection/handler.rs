//! Connection Handler Module
//!
//! This module handles individual client connections to the proxy.
//! Each client gets its own handler task that runs in a loop, reading
//! commands, dispatching them to that connection's orchestrator, and
//! flushing the rendered response bytes back to the socket.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned with its own L1Only orchestrator
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Parse text command      │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Dispatch to orca        │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Flush response bytes    │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client quits / disconnects / error
//! ```
//!
//! ## Buffer Management
//!
//! Incoming data accumulates in a `BytesMut` buffer because TCP is a
//! stream: a read may hold a partial command or several pipelined ones.
//! Outgoing data is rendered by the orchestrator's responder into a shared
//! in-memory buffer, then written to the socket once per command; the
//! orchestrator core stays synchronous while all socket I/O is async.

use crate::handlers::{MemoryHandler, NullHandler};
use crate::orca::{dispatch, L1Only, OrcaError};
use crate::protocol::responder::{Responder, TextResponder};
use crate::protocol::types::Command;
use crate::protocol::{parse, ParseError};
use bytes::BytesMut;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Maximum size for the read buffer. One storage command's data block can
/// approach the parser's value cap, so leave headroom above it.
const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// An in-memory response buffer shared between the orchestrator's
/// responder and the connection loop that drains it to the socket.
///
/// The lock is never contended (both ends live on the same task); it
/// exists so the buffer can be owned from two places.
#[derive(Debug, Clone, Default)]
pub struct ResponseBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes everything rendered so far, leaving the buffer empty.
    pub fn drain(&self) -> Vec<u8> {
        std::mem::take(&mut *self.inner.lock().unwrap())
    }
}

impl Write for ResponseBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The orchestrator type a connection runs. One per connection; the
/// engine-backed tier handles inside are shared and concurrency-safe.
type ConnectionOrca = L1Only<MemoryHandler, NullHandler, TextResponder<ResponseBuffer>>;

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// This connection's orchestrator, bound to the shared tiers and to
    /// `response`
    orca: ConnectionOrca,

    /// Where the orchestrator's responder renders to
    response: ResponseBuffer,

    /// A second responder over the same buffer, used to render protocol
    /// failure lines for errors the orchestrator returns
    error_responder: TextResponder<ResponseBuffer>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler bound to the shared primary tier.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        l1: MemoryHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        let response = ResponseBuffer::new();
        let orca = L1Only::new(l1, NullHandler, TextResponder::new(response.clone()));
        let error_responder = TextResponder::new(response.clone());

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            orca,
            response,
            error_responder,
            stats,
        }
    }

    /// Runs the main connection loop.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-dispatch-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(command) = self.try_parse_command()? {
                let closing = matches!(command, Command::Quit(_));

                self.execute(command)?;
                self.stats.command_processed();
                self.flush_response().await?;

                if closing {
                    return Ok(());
                }
            }

            // Need more data
            self.read_more_data().await?;
        }
    }

    /// Attempts to parse a command from the buffer.
    fn try_parse_command(&mut self) -> Result<Option<Command>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match parse(&self.buffer) {
            Ok(Some((command, consumed))) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    command = %command,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Parsed command"
                );
                Ok(Some(command))
            }
            Ok(None) => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete command, need more data"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Parse error");
                Err(ConnectionError::ParseError(e))
            }
        }
    }

    /// Dispatches one command to the orchestrator and renders the failure
    /// line for any semantic error it reports back.
    fn execute(&mut self, command: Command) -> Result<(), ConnectionError> {
        let name = command.name();
        let opaque = command.opaque();
        let quiet = command.is_quiet();

        match dispatch(&mut self.orca, command) {
            Ok(()) => Ok(()),
            Err(OrcaError::Cache(e)) => {
                debug!(client = %self.addr, command = name, outcome = %e, "Command failed");
                self.error_responder.error(opaque, quiet, e)?;
                Ok(())
            }
            Err(OrcaError::Transport(e)) => {
                error!(client = %self.addr, command = name, error = %e, "Responder write failed");
                Err(ConnectionError::IoError(e))
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            // Connection closed by client
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial command in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Writes whatever the responder rendered for the last command.
    async fn flush_response(&mut self) -> Result<(), ConnectionError> {
        let bytes = self.response.drain();
        if bytes.is_empty() {
            return Ok(());
        }

        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Text protocol parse error
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial command)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Handles a client connection to completion.
///
/// Convenience wrapper that builds a [`ConnectionHandler`] and runs it,
/// downgrading routine disconnects to debug logging.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    l1: MemoryHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, l1, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn create_test_server() -> (SocketAddr, Arc<StorageEngine>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let engine = Arc::new(StorageEngine::new());
        let stats = Arc::new(ConnectionStats::new());

        let engine_clone = Arc::clone(&engine);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let l1 = MemoryHandler::new(Arc::clone(&engine_clone));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, l1, stats));
            }
        });

        (addr, engine, stats)
    }

    async fn read_exactly(client: &mut TcpStream, want: usize) -> Vec<u8> {
        let mut buf = vec![0u8; want];
        let mut total = 0;
        while total < want {
            let n = client.read(&mut buf[total..]).await.unwrap();
            assert!(n > 0, "connection closed early");
            total += n;
        }
        buf
    }

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"set name 0 0 3\r\nAda\r\n")
            .await
            .unwrap();
        assert_eq!(read_exactly(&mut client, 8).await, b"STORED\r\n");

        client.write_all(b"get name\r\n").await.unwrap();
        assert_eq!(
            read_exactly(&mut client, 26).await,
            b"VALUE name 0 3\r\nAda\r\nEND\r\n"
        );
    }

    #[tokio::test]
    async fn get_miss_renders_not_found_line() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        // The orchestrator renders nothing for a single-key miss; the
        // connection layer turns the returned error into the protocol line.
        client.write_all(b"get missing\r\n").await.unwrap();
        assert_eq!(read_exactly(&mut client, 11).await, b"NOT_FOUND\r\n");
    }

    #[tokio::test]
    async fn unsupported_command_renders_error_line() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"touch key 60\r\n").await.unwrap();
        assert_eq!(read_exactly(&mut client, 7).await, b"ERROR\r\n");
    }

    #[tokio::test]
    async fn delete_roundtrip() {
        let (addr, engine, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        engine.set(bytes::Bytes::from("key"), bytes::Bytes::from("v"), 0, 0);

        client.write_all(b"delete key\r\n").await.unwrap();
        assert_eq!(read_exactly(&mut client, 9).await, b"DELETED\r\n");

        client.write_all(b"delete key\r\n").await.unwrap();
        assert_eq!(read_exactly(&mut client, 11).await, b"NOT_FOUND\r\n");
    }

    #[tokio::test]
    async fn replace_miss_renders_not_stored() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"replace key 0 0 1\r\nx\r\n")
            .await
            .unwrap();
        assert_eq!(read_exactly(&mut client, 12).await, b"NOT_STORED\r\n");
    }

    #[tokio::test]
    async fn noreply_set_produces_no_response() {
        let (addr, engine, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"set key 0 0 1 noreply\r\nx\r\nversion\r\n")
            .await
            .unwrap();

        // The next thing on the wire is the version line, not STORED.
        let line = read_exactly(&mut client, 8).await;
        assert_eq!(&line, b"VERSION ");

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(engine.exists(b"key"));
    }

    #[tokio::test]
    async fn quit_closes_connection_after_farewell() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"quit\r\n").await.unwrap();
        assert_eq!(read_exactly(&mut client, 5).await, b"Bye\r\n");

        // Server closes; the next read returns EOF.
        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn pipelined_commands_answered_in_order() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"set k1 0 0 2\r\nv1\r\nset k2 0 0 2\r\nv2\r\nget k1\r\nget k2\r\n")
            .await
            .unwrap();

        let expected: &[u8] =
            b"STORED\r\nSTORED\r\nVALUE k1 0 2\r\nv1\r\nEND\r\nVALUE k2 0 2\r\nv2\r\nEND\r\n";
        assert_eq!(read_exactly(&mut client, expected.len()).await, expected);
    }

    #[tokio::test]
    async fn connection_stats_track_activity() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        client.write_all(b"noop\r\n").await.unwrap();
        let _ = read_exactly(&mut client, 16).await;

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(stats.commands_processed.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        drop(client);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
