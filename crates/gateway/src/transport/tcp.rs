//! Plain TCP connections to the franchise

use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;
use tokio::net::TcpStream;

use super::{Connection, ConnectionFactory};
use crate::error::{GatewayError, GatewayResult};

/// Default time allowed to establish a TCP connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Dials the configured franchise address
#[derive(Debug, Clone)]
pub struct TcpConnectionFactory {
    address: String,
    connect_timeout: Duration,
}

impl TcpConnectionFactory {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl ConnectionFactory for TcpConnectionFactory {
    async fn connect(&self) -> GatewayResult<Connection> {
        debug!("Dialing franchise at {}", self.address);

        let stream =
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
                .await
            {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    warn!("Connection to {} failed: {}", self.address, e);
                    return Err(GatewayError::Connect(format!("{}: {}", self.address, e)));
                }
                Err(_) => {
                    warn!("Connection to {} timed out", self.address);
                    return Err(GatewayError::Connect(format!(
                        "{}: timed out after {:?}",
                        self.address, self.connect_timeout
                    )));
                }
            };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Could not set TCP_NODELAY on {}: {}", self.address, e);
        }

        let local = stream.local_addr().ok();
        let peer = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();
        Ok(Connection::new(reader, writer).with_addrs(local, peer))
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }
}
