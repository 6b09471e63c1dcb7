//! Correlation registry
//!
//! A single actor task owns the map from correlation key to the waiting
//! caller. Every operation is a message on one queue, so the map itself
//! needs no lock and operations are applied in the order they were issued.

use franchise_core::{CorrelationKey, Message};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

use crate::error::{GatewayError, GatewayResult};

static NEXT_REGISTRATION: AtomicU64 = AtomicU64::new(1);

/// What a waiter's channel resolves to
enum Settlement {
    Response(Message),
    Superseded,
}

enum Command {
    Register {
        key: CorrelationKey,
        id: u64,
        tx: oneshot::Sender<Settlement>,
    },
    Deliver {
        key: CorrelationKey,
        message: Message,
    },
    Unregister {
        key: CorrelationKey,
        /// Only remove the entry created by this registration
        id: Option<u64>,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

struct PendingRequest {
    id: u64,
    tx: oneshot::Sender<Settlement>,
    created_at: Instant,
}

/// Handle to the registry actor
#[derive(Clone)]
pub struct CorrelationRegistry {
    tx: mpsc::UnboundedSender<Command>,
}

impl CorrelationRegistry {
    /// Spawn the actor on the current runtime
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Self { tx }
    }

    /// Register interest in the response for `key`
    ///
    /// Must be called before the request is written: once this returns, any
    /// later delivery for `key` reaches the returned waiter. A stale entry
    /// for the same key is replaced.
    pub fn register(&self, key: CorrelationKey) -> GatewayResult<PendingResponse> {
        let id = NEXT_REGISTRATION.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Register {
                key: key.clone(),
                id,
                tx,
            })
            .map_err(|_| GatewayError::RegistryClosed)?;

        Ok(PendingResponse {
            key,
            id,
            rx,
            registry: self.clone(),
            settled: false,
        })
    }

    /// Route a response to its waiter; no-op when nobody waits for `key`
    pub fn deliver(&self, key: CorrelationKey, message: Message) -> GatewayResult<()> {
        self.tx
            .send(Command::Deliver { key, message })
            .map_err(|_| GatewayError::RegistryClosed)
    }

    /// Remove the entry for `key`, if any
    pub fn unregister(&self, key: &CorrelationKey) {
        let _ = self.tx.send(Command::Unregister {
            key: key.clone(),
            id: None,
        });
    }

    /// Number of outstanding exchanges
    pub async fn pending_count(&self) -> GatewayResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Len { reply })
            .map_err(|_| GatewayError::RegistryClosed)?;
        rx.await.map_err(|_| GatewayError::RegistryClosed)
    }

    /// Stop the actor; outstanding waiters are released
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn unregister_exact(&self, key: &CorrelationKey, id: u64) {
        let _ = self.tx.send(Command::Unregister {
            key: key.clone(),
            id: Some(id),
        });
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut pending: HashMap<CorrelationKey, PendingRequest> = HashMap::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Register { key, id, tx } => {
                let request = PendingRequest {
                    id,
                    tx,
                    created_at: Instant::now(),
                };
                if let Some(stale) = pending.insert(key.clone(), request) {
                    warn!("Replaced stale pending request for key {}", key);
                    let _ = stale.tx.send(Settlement::Superseded);
                }
            }
            Command::Deliver { key, message } => match pending.remove(&key) {
                Some(request) => {
                    debug!(
                        "Delivering response for {} after {:?}",
                        key,
                        request.created_at.elapsed()
                    );
                    if request.tx.send(Settlement::Response(message)).is_err() {
                        debug!("Waiter for {} is gone", key);
                    }
                }
                None => debug!("No pending request for {}, dropping response", key),
            },
            Command::Unregister { key, id } => {
                let matches = match id {
                    Some(id) => pending.get(&key).is_some_and(|r| r.id == id),
                    None => true,
                };
                if matches {
                    pending.remove(&key);
                }
            }
            Command::Len { reply } => {
                let _ = reply.send(pending.len());
            }
            Command::Shutdown => break,
        }
    }

    info!(
        "Correlation registry stopped, releasing {} pending request(s)",
        pending.len()
    );
}

/// A registered waiter for one response
///
/// Dropping it before a response arrives removes the registry entry.
pub struct PendingResponse {
    key: CorrelationKey,
    id: u64,
    rx: oneshot::Receiver<Settlement>,
    registry: CorrelationRegistry,
    settled: bool,
}

impl PendingResponse {
    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    /// Wait for the response, `None` on timeout
    ///
    /// On timeout the entry is unregistered, so a late response is dropped.
    pub async fn wait(mut self, timeout: Duration) -> GatewayResult<Option<Message>> {
        let result = tokio::time::timeout(timeout, &mut self.rx).await;
        self.settled = true;
        match result {
            Ok(Ok(Settlement::Response(message))) => Ok(Some(message)),
            Ok(Ok(Settlement::Superseded)) => Err(GatewayError::Superseded(self.key.to_string())),
            // Sender dropped without settling: the actor stopped
            Ok(Err(_)) => Err(GatewayError::RegistryClosed),
            Err(_) => {
                self.registry.unregister_exact(&self.key, self.id);
                Ok(None)
            }
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        if !self.settled {
            self.registry.unregister_exact(&self.key, self.id);
        }
    }
}
