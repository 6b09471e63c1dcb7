//! Frame reader and dispatch loop
//!
//! Reads frames off the supervisor's current connection one at a time and
//! feeds each decoded message into the handler pipeline. Nothing here ends
//! the loop except the shutdown token: read failures back off and retry,
//! undecodable frames are dropped.
//!
//! A frame whose body does not arrive within the per-frame deadline leaves
//! the peer owing the rest of it. Those bytes are drained before the next
//! header is read, as long as the connection has not been replaced.

use franchise_core::{FrameCodec, HEADER_LEN};
use log::{debug, info, warn};
use std::io;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::ReaderConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::pipeline::Pipeline;
use crate::supervisor::ConnectionSupervisor;

const DRAIN_CHUNK: usize = 8 * 1024;

/// Bytes of an abandoned frame still to come on one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameDebt {
    connection_id: u64,
    remaining: usize,
}

pub struct FrameReader {
    supervisor: Arc<ConnectionSupervisor>,
    pipeline: Pipeline,
    codec: FrameCodec,
    config: ReaderConfig,
    debt: Option<FrameDebt>,
}

impl FrameReader {
    pub fn new(
        supervisor: Arc<ConnectionSupervisor>,
        pipeline: Pipeline,
        config: ReaderConfig,
    ) -> Self {
        Self {
            supervisor,
            pipeline,
            codec: FrameCodec::new(config.max_frame_len),
            config,
            debt: None,
        }
    }

    /// Read and dispatch frames until `shutdown` is cancelled
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Frame reader started");
        while !shutdown.is_cancelled() {
            self.next_frame(&shutdown).await;
        }
        info!("Frame reader stopped");
    }

    /// One iteration: settle any debt, read a header, read the body, dispatch
    async fn next_frame(&mut self, shutdown: &CancellationToken) {
        if !self.settle_debt(shutdown).await {
            return;
        }

        let mut header = [0u8; HEADER_LEN];
        let read = tokio::select! {
            _ = shutdown.cancelled() => return,
            read = self.supervisor.read_exact(&mut header) => read,
        };
        if let Err(e) = read {
            warn!(
                "Reading frame header failed: {}; retrying in {:?}",
                e, self.config.header_backoff
            );
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(self.config.header_backoff) => {}
            }
            return;
        }

        let connection_id = self.supervisor.connection_id().await;
        let len = FrameCodec::body_len(header);
        if let Err(e) = self.codec.check_len(len) {
            warn!("Discarding frame: {}", e);
            self.owe(connection_id, len);
            return;
        }

        let mut body = vec![0u8; len];
        let mut filled = 0;
        let read = tokio::time::timeout(
            self.config.frame_deadline,
            read_body(&self.supervisor, &mut body, &mut filled),
        )
        .await;

        match read {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Reading frame body failed after {}/{} bytes: {}", filled, len, e);
                return;
            }
            Err(_) => {
                warn!(
                    "Frame body incomplete after {:?} ({}/{} bytes), abandoning frame",
                    self.config.frame_deadline, filled, len
                );
                self.owe(connection_id, len - filled);
                return;
            }
        }

        let message = match self.codec.decode_body(&body) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping undecodable frame of {} bytes: {}", len, e);
                return;
            }
        };

        // ErrorReporting has already logged it
        if let Err(e) = self
            .pipeline
            .handle(self.supervisor.as_ref(), message)
            .await
        {
            debug!("Pipeline returned error: {}", e);
        }
    }

    fn owe(&mut self, connection_id: Option<u64>, remaining: usize) {
        self.debt = match connection_id {
            Some(connection_id) if remaining > 0 => Some(FrameDebt {
                connection_id,
                remaining,
            }),
            _ => None,
        };
    }

    /// Drain bytes owed by an abandoned frame
    ///
    /// Returns `true` when the stream is aligned on a header again.
    async fn settle_debt(&mut self, shutdown: &CancellationToken) -> bool {
        let Some(debt) = self.debt else {
            return true;
        };
        if self.supervisor.connection_id().await != Some(debt.connection_id) {
            debug!(
                "Connection {} replaced, forgetting {} owed bytes",
                debt.connection_id, debt.remaining
            );
            self.debt = None;
            return true;
        }

        let mut remaining = debt.remaining;
        let drained = tokio::time::timeout(
            self.config.frame_deadline,
            drain(&self.supervisor, &mut remaining),
        )
        .await;

        match drained {
            Ok(Ok(())) => {
                debug!("Drained {} bytes of an abandoned frame", debt.remaining);
                self.debt = None;
                true
            }
            Ok(Err(e)) => {
                warn!("Draining abandoned frame failed: {}", e);
                self.debt = None;
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = tokio::time::sleep(self.config.header_backoff) => {}
                }
                false
            }
            Err(_) => {
                warn!("Still owed {} bytes of an abandoned frame", remaining);
                self.debt = Some(FrameDebt { remaining, ..debt });
                false
            }
        }
    }
}

async fn read_body(
    supervisor: &ConnectionSupervisor,
    body: &mut [u8],
    filled: &mut usize,
) -> GatewayResult<()> {
    while *filled < body.len() {
        let n = supervisor.read(&mut body[*filled..]).await?;
        if n == 0 {
            return Err(eof());
        }
        *filled += n;
    }
    Ok(())
}

async fn drain(supervisor: &ConnectionSupervisor, remaining: &mut usize) -> GatewayResult<()> {
    let mut scratch = vec![0u8; DRAIN_CHUNK.min(*remaining)];
    while *remaining > 0 {
        let want = scratch.len().min(*remaining);
        let n = supervisor.read(&mut scratch[..want]).await?;
        if n == 0 {
            return Err(eof());
        }
        *remaining -= n;
    }
    Ok(())
}

fn eof() -> GatewayError {
    GatewayError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "peer closed the connection mid-frame",
    ))
}
