//! Connection supervisor
//!
//! Owns the current connection to the franchise and hands out I/O against
//! it. The handle sits behind an async `RwLock`: reads and writes hold the
//! shared lock for the duration of the call, replacing the handle takes the
//! exclusive lock. Before a handle is replaced it is closed, which fails any
//! I/O parked on it and so releases their shared locks.

use async_trait::async_trait;
use franchise_core::{FrameCodec, Message};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::ReconnectPolicy;
use crate::error::{GatewayError, GatewayResult};
use crate::heartbeat::{HeartbeatAlarm, HeartbeatMonitor};
use crate::sign_on::SignOn;
use crate::transport::{Connection, ConnectionFactory, MessageSender};

/// Whether a connection is currently installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

enum Slot {
    Disconnected,
    Connected(Arc<Connection>),
}

pub struct ConnectionSupervisor {
    factory: Arc<dyn ConnectionFactory>,
    heartbeat: Arc<HeartbeatMonitor>,
    sign_on: SignOn,
    codec: FrameCodec,
    policy: ReconnectPolicy,
    slot: RwLock<Slot>,
    /// Cancels the heartbeat schedule bound to the current connection
    schedule: Mutex<Option<CancellationToken>>,
    shutdown: CancellationToken,
    reconnects: AtomicU32,
}

impl ConnectionSupervisor {
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        heartbeat: Arc<HeartbeatMonitor>,
        codec: FrameCodec,
        policy: ReconnectPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            factory,
            heartbeat,
            sign_on: SignOn::new(codec),
            codec,
            policy,
            slot: RwLock::new(Slot::Disconnected),
            schedule: Mutex::new(None),
            shutdown,
            reconnects: AtomicU32::new(0),
        }
    }

    /// Connect, sign on and start probing the new connection
    ///
    /// A previously installed connection is closed first. If the sign-on
    /// cannot be written the new connection is closed and the supervisor is
    /// left disconnected.
    pub async fn setup_connection(self: &Arc<Self>) -> GatewayResult<()> {
        if let Some(previous) = self.current().await {
            if let Err(e) = previous.close().await {
                warn!("Closing connection {} failed: {}", previous.id(), e);
            }
        }

        let connection = Arc::new(self.factory.connect().await?);
        let id = connection.id();
        {
            let mut slot = self.slot.write().await;
            *slot = Slot::Connected(connection.clone());

            if let Err(e) = self.sign_on.send(&connection).await {
                error!("Sign-on on connection {} failed: {}", id, e);
                if let Err(close_err) = connection.close().await {
                    debug!("Closing connection {} failed: {}", id, close_err);
                }
                *slot = Slot::Disconnected;
                return Err(e);
            }
        }

        info!(
            "Connected to {} (connection {}, peer {:?})",
            self.factory.describe(),
            id,
            connection.peer_addr()
        );
        self.start_heartbeat();
        Ok(())
    }

    /// Replace a dead connection
    ///
    /// Closes the current connection (a close error is logged, not
    /// returned), then runs [`setup_connection`](Self::setup_connection) up
    /// to `max_attempts` times. Exhausting the attempts is fatal.
    pub async fn try_reconnect(self: &Arc<Self>) -> GatewayResult<()> {
        self.stop_heartbeat();
        if let Err(e) = self.close().await {
            warn!("Closing dead connection failed: {}", e);
        }

        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            if self.shutdown.is_cancelled() {
                return Err(GatewayError::NotConnected);
            }
            match self.setup_connection().await {
                Ok(()) => {
                    let total = self.reconnects.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(
                        "Reconnected on attempt {} (reconnects so far: {})",
                        attempt, total
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!("Reconnect attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        error!("Giving up after {} reconnect attempt(s)", attempts);
        Err(GatewayError::ReconnectFailed {
            attempts,
            source: Box::new(last_error.unwrap_or(GatewayError::NotConnected)),
        })
    }

    /// Consume heartbeat alarms until shutdown
    ///
    /// Each alarm triggers [`try_reconnect`](Self::try_reconnect). Returns
    /// the fatal error when reconnecting fails.
    pub async fn run(
        self: Arc<Self>,
        mut alarms: mpsc::Receiver<HeartbeatAlarm>,
    ) -> GatewayResult<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                alarm = alarms.recv() => {
                    let Some(alarm) = alarm else {
                        debug!("Heartbeat alarm channel closed");
                        return Ok(());
                    };
                    warn!(
                        "Heartbeat alarm after {} failures ({:?}), reconnecting",
                        alarm.consecutive_failures, alarm.last_failure
                    );
                    self.try_reconnect().await?;

                    // Alarms about the old connection are stale
                    while alarms.try_recv().is_ok() {}
                }
            }
        }
    }

    /// Read up to `buf.len()` bytes from the current connection
    pub async fn read(&self, buf: &mut [u8]) -> GatewayResult<usize> {
        let slot = self.slot.read().await;
        match &*slot {
            Slot::Connected(connection) => Ok(connection.read(buf).await?),
            Slot::Disconnected => Err(GatewayError::NotConnected),
        }
    }

    /// Fill `buf` from the current connection
    pub async fn read_exact(&self, buf: &mut [u8]) -> GatewayResult<()> {
        let slot = self.slot.read().await;
        match &*slot {
            Slot::Connected(connection) => Ok(connection.read_exact(buf).await?),
            Slot::Disconnected => Err(GatewayError::NotConnected),
        }
    }

    /// Write one encoded frame to the current connection
    pub async fn write_frame(&self, frame: &[u8]) -> GatewayResult<()> {
        let slot = self.slot.read().await;
        match &*slot {
            Slot::Connected(connection) => Ok(connection.write_all(frame).await?),
            Slot::Disconnected => Err(GatewayError::NotConnected),
        }
    }

    /// Close the current connection and mark the supervisor disconnected
    pub async fn close(&self) -> GatewayResult<()> {
        let Some(connection) = self.current().await else {
            return Ok(());
        };
        let result = connection.close().await;

        let mut slot = self.slot.write().await;
        if matches!(&*slot, Slot::Connected(c) if c.id() == connection.id()) {
            *slot = Slot::Disconnected;
        }
        Ok(result?)
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.current().await.and_then(|c| c.local_addr())
    }

    pub async fn peer_addr(&self) -> Option<SocketAddr> {
        self.current().await.and_then(|c| c.peer_addr())
    }

    pub async fn state(&self) -> ConnectionState {
        match &*self.slot.read().await {
            Slot::Connected(_) => ConnectionState::Connected,
            Slot::Disconnected => ConnectionState::Disconnected,
        }
    }

    /// Id of the installed connection, if any
    pub async fn connection_id(&self) -> Option<u64> {
        self.current().await.map(|c| c.id())
    }

    /// Successful reconnects since start
    pub fn reconnect_count(&self) -> u32 {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn heartbeat(&self) -> &Arc<HeartbeatMonitor> {
        &self.heartbeat
    }

    /// Stop probing and close the connection
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.stop_heartbeat();
        if let Err(e) = self.close().await {
            debug!("Closing connection on shutdown failed: {}", e);
        }
        info!("Connection supervisor stopped");
    }

    async fn current(&self) -> Option<Arc<Connection>> {
        match &*self.slot.read().await {
            Slot::Connected(connection) => Some(connection.clone()),
            Slot::Disconnected => None,
        }
    }

    fn start_heartbeat(self: &Arc<Self>) {
        let token = self.shutdown.child_token();
        if let Some(previous) = self.schedule.lock().replace(token.clone()) {
            previous.cancel();
        }
        let sender: Arc<dyn MessageSender> = self.clone();
        tokio::spawn(self.heartbeat.clone().run_schedule(sender, token));
    }

    fn stop_heartbeat(&self) {
        if let Some(token) = self.schedule.lock().take() {
            token.cancel();
        }
    }
}

#[async_trait]
impl MessageSender for ConnectionSupervisor {
    async fn send(&self, message: &Message) -> GatewayResult<()> {
        let frame = self.codec.encode(message)?;
        self.write_frame(&frame).await
    }
}
