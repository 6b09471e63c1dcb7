//! In-memory transport for tests and single-process wiring
//!
//! Each `connect` creates a `tokio::io::duplex` pipe: the gateway keeps one
//! end, the other end is handed to whoever plays the peer.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use super::{Connection, ConnectionFactory};
use crate::error::{GatewayError, GatewayResult};

/// Connection factory producing in-memory pipes
pub struct DuplexConnectionFactory {
    buffer: usize,
    peers: mpsc::UnboundedSender<DuplexStream>,
    refuse: AtomicBool,
    connects: AtomicU32,
}

impl DuplexConnectionFactory {
    /// Create a factory and the receiver of peer ends (one per connection)
    pub fn new(buffer: usize) -> (Self, mpsc::UnboundedReceiver<DuplexStream>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let factory = Self {
            buffer,
            peers,
            refuse: AtomicBool::new(false),
            connects: AtomicU32::new(0),
        };
        (factory, rx)
    }

    /// Make subsequent `connect` calls fail (or succeed again)
    pub fn set_refusing(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of `connect` calls, successful or not
    pub fn connect_attempts(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionFactory for DuplexConnectionFactory {
    async fn connect(&self) -> GatewayResult<Connection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(GatewayError::Connect("duplex peer refused".to_string()));
        }

        let (local, peer) = tokio::io::duplex(self.buffer);
        self.peers
            .send(peer)
            .map_err(|_| GatewayError::Connect("duplex peer receiver dropped".to_string()))?;

        let (reader, writer) = tokio::io::split(local);
        Ok(Connection::new(reader, writer))
    }

    fn describe(&self) -> String {
        "duplex".to_string()
    }
}
