use franchise_core::{FrameCodec, Message, MessageKind, ResponseCode};
use log::{debug, info, warn};
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::Result;
use crate::infrastructure::{read_frame, write_frame};
use crate::model::{DECLINE_CODE, PeerBehavior, PeerStats, PeerStatsSnapshot};

/// TCP listener answering gateway connections
pub struct FranchisePeer {
    listener: TcpListener,
    addr: SocketAddr,
    behavior: Arc<RwLock<PeerBehavior>>,
    stats: Arc<PeerStats>,
    codec: FrameCodec,
    shutdown: CancellationToken,
}

impl FranchisePeer {
    /// Bind the listener; use port 0 for an ephemeral port
    pub async fn bind(addr: &str, behavior: PeerBehavior) -> Result<Self> {
        behavior.validate()?;
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        Ok(Self {
            listener,
            addr,
            behavior: Arc::new(RwLock::new(behavior)),
            stats: Arc::new(PeerStats::default()),
            codec: FrameCodec::default(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Control handle, valid before and after `run`
    pub fn handle(&self) -> PeerHandle {
        PeerHandle {
            addr: self.addr,
            behavior: self.behavior.clone(),
            stats: self.stats.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Run on a background task
    pub fn spawn(self) -> (PeerHandle, JoinHandle<Result<()>>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }

    /// Accept connections until shut down
    pub async fn run(self) -> Result<()> {
        info!("Franchise peer listening on {}", self.addr);

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            let (stream, remote) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Error accepting connection: {}", e);
                    continue;
                }
            };

            self.stats.record_connection();
            info!("Connection accepted: {}", remote);

            let session = self.session();
            tokio::spawn(async move {
                if let Err(e) = session.serve(stream).await {
                    warn!("Connection {} ended with error: {}", remote, e);
                }
            });
        }

        info!("Franchise peer on {} stopped", self.addr);
        Ok(())
    }

    fn session(&self) -> PeerSession {
        PeerSession {
            behavior: self.behavior.clone(),
            stats: self.stats.clone(),
            codec: self.codec,
            shutdown: self.shutdown.child_token(),
        }
    }
}

/// Shared control over a running peer
#[derive(Clone)]
pub struct PeerHandle {
    addr: SocketAddr,
    behavior: Arc<RwLock<PeerBehavior>>,
    stats: Arc<PeerStats>,
    shutdown: CancellationToken,
}

impl PeerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Replace the behavior; applies to the next frame on every connection
    pub async fn set_behavior(&self, behavior: PeerBehavior) -> Result<()> {
        behavior.validate()?;
        *self.behavior.write().await = behavior;
        Ok(())
    }

    pub async fn behavior(&self) -> PeerBehavior {
        self.behavior.read().await.clone()
    }

    pub fn stats(&self) -> PeerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop accepting and close every connection
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Serve one already-established stream, e.g. an in-memory pipe
    pub fn session(&self) -> PeerSession {
        PeerSession {
            behavior: self.behavior.clone(),
            stats: self.stats.clone(),
            codec: FrameCodec::default(),
            shutdown: self.shutdown.child_token(),
        }
    }
}

/// One gateway connection
pub struct PeerSession {
    behavior: Arc<RwLock<PeerBehavior>>,
    stats: Arc<PeerStats>,
    codec: FrameCodec,
    shutdown: CancellationToken,
}

impl PeerSession {
    /// Answer frames on `stream` until it closes or the peer shuts down
    pub async fn serve<S>(self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, writer) = tokio::io::split(stream);
        let writer = Arc::new(Mutex::new(writer));

        loop {
            let request = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                request = read_frame(&mut reader, &self.codec) => request?,
            };
            let Some(request) = request else {
                info!("Client closed connection");
                break;
            };
            debug!("Request: {:?}", request);

            let behavior = self.behavior.read().await.clone();
            let Some(response) = self.respond(request, &behavior) else {
                continue;
            };

            if behavior.response_delay.is_zero() {
                write_frame(&mut *writer.lock().await, &self.codec, &response).await?;
                self.stats.record_response();
                debug!("Response: {:?}", response);
                continue;
            }

            let writer = writer.clone();
            let stats = self.stats.clone();
            let codec = self.codec;
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(behavior.response_delay) => {}
                }
                match write_frame(&mut *writer.lock().await, &codec, &response).await {
                    Ok(()) => stats.record_response(),
                    Err(e) => warn!("Error writing delayed response: {}", e),
                }
            });
        }

        Ok(())
    }

    /// Build the reply to `request`, `None` when it is swallowed
    fn respond(&self, request: Message, behavior: &PeerBehavior) -> Option<Message> {
        let code = match request.kind() {
            MessageKind::SignOn => {
                self.stats.record_sign_on();
                info!("Sign-on received");
                ResponseCode::APPROVED.to_string()
            }
            MessageKind::Echo => {
                self.stats.record_echo();
                if behavior.ignore_echo {
                    debug!("Ignoring echo {:?}", request.request_id);
                    return None;
                }
                behavior.echo_response_code.clone()
            }
            MessageKind::Transaction => {
                self.stats.record_transaction();
                if behavior.ignore_transactions {
                    debug!("Ignoring transaction {:?}", request.request_id);
                    return None;
                }
                if roll_decline(behavior.decline_rate) {
                    DECLINE_CODE.to_string()
                } else {
                    behavior.transaction_response_code.clone()
                }
            }
        };
        Some(reply(request, code))
    }
}

/// Copy of `request` carrying a response code and a fresh authorization code
pub fn reply(request: Message, code: impl Into<String>) -> Message {
    let mut response = request;
    response.f39 = code.into();
    response.f38 = Uuid::new_v4().simple().to_string()[..6].to_string();
    response
}

fn roll_decline(rate: f64) -> bool {
    rate > 0.0 && rand::thread_rng().gen_bool(rate.clamp(0.0, 1.0))
}
