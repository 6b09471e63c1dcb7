//! Transport abstraction layer
//!
//! A [`Connection`] is one live byte stream to the franchise peer, split
//! into independently locked read and write halves. Connections come from
//! an injected [`ConnectionFactory`]: TCP in production, in-memory duplex
//! pipes in tests.

pub mod duplex;
pub mod tcp;

pub use duplex::DuplexConnectionFactory;
pub use tcp::TcpConnectionFactory;

use async_trait::async_trait;
use franchise_core::Message;
use log::warn;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayResult;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Provider of fresh connections to the peer
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Establish a new connection
    async fn connect(&self) -> GatewayResult<Connection>;

    /// Human readable target, for logs
    fn describe(&self) -> String {
        "connection factory".to_string()
    }
}

/// Anything that can put a whole message on the wire
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Encode and write one frame
    async fn send(&self, message: &Message) -> GatewayResult<()>;
}

/// One live connection to the peer
///
/// Reads and writes lock separate halves, so the frame reader and any
/// number of writers can use the same connection concurrently. Each write
/// is one whole frame under the writer lock: frames are never interleaved.
pub struct Connection {
    id: u64,
    reader: Mutex<BoxedReader>,
    writer: Mutex<BoxedWriter>,
    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,
    closed: CancellationToken,
}

impl Connection {
    /// Wrap a pair of stream halves
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            reader: Mutex::new(Box::new(reader)),
            writer: Mutex::new(Box::new(writer)),
            local_addr: None,
            peer_addr: None,
            closed: CancellationToken::new(),
        }
    }

    /// Attach socket addresses
    pub fn with_addrs(mut self, local: Option<SocketAddr>, peer: Option<SocketAddr>) -> Self {
        self.local_addr = local;
        self.peer_addr = peer;
        self
    }

    /// Process-unique connection id
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Read whatever is available, at most `buf.len()` bytes
    ///
    /// Returns early with an error if the connection is closed meanwhile.
    pub async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Err(closed_error());
        }
        let mut reader = tokio::select! {
            guard = self.reader.lock() => guard,
            _ = self.closed.cancelled() => return Err(closed_error()),
        };
        tokio::select! {
            res = reader.read(buf) => res,
            _ = self.closed.cancelled() => Err(closed_error()),
        }
    }

    /// Fill `buf` completely
    pub async fn read_exact(&self, buf: &mut [u8]) -> io::Result<()> {
        if self.is_closed() {
            return Err(closed_error());
        }
        let mut reader = tokio::select! {
            guard = self.reader.lock() => guard,
            _ = self.closed.cancelled() => return Err(closed_error()),
        };
        tokio::select! {
            res = reader.read_exact(buf) => res.map(|_| ()),
            _ = self.closed.cancelled() => Err(closed_error()),
        }
    }

    /// Write one whole frame and flush it
    ///
    /// If the write stops after part of the frame went out (the future is
    /// dropped, the peer stalls, an I/O error), the connection is closed:
    /// the stream is no longer frame-aligned.
    pub async fn write_all(&self, frame: &[u8]) -> io::Result<()> {
        if self.is_closed() {
            return Err(closed_error());
        }
        let mut writer = tokio::select! {
            guard = self.writer.lock() => guard,
            _ = self.closed.cancelled() => return Err(closed_error()),
        };
        if self.is_closed() {
            return Err(closed_error());
        }

        let mut progress = FrameProgress {
            connection: self,
            written: 0,
            len: frame.len(),
        };
        tokio::select! {
            res = async {
                while progress.written < frame.len() {
                    let n = writer.write(&frame[progress.written..]).await?;
                    if n == 0 {
                        return Err(io::Error::from(io::ErrorKind::WriteZero));
                    }
                    progress.written += n;
                }
                writer.flush().await
            } => res,
            _ = self.closed.cancelled() => Err(closed_error()),
        }
    }

    /// Close the connection
    ///
    /// Pending and future reads fail immediately. The write half is shut
    /// down unless a write is in flight, in which case it is released when
    /// the connection is dropped. Closing twice is a no-op.
    pub async fn close(&self) -> io::Result<()> {
        if self.closed.is_cancelled() {
            return Ok(());
        }
        self.closed.cancel();
        match self.writer.try_lock() {
            Ok(mut writer) => writer.shutdown().await,
            Err(_) => Ok(()),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "connection closed")
}

/// Closes the connection when dropped in the middle of a frame
struct FrameProgress<'a> {
    connection: &'a Connection,
    written: usize,
    len: usize,
}

impl Drop for FrameProgress<'_> {
    fn drop(&mut self) {
        if self.written > 0 && self.written < self.len && !self.connection.is_closed() {
            warn!(
                "Torn frame on connection {} ({} of {} bytes written), closing it",
                self.connection.id, self.written, self.len
            );
            self.connection.closed.cancel();
        }
    }
}
