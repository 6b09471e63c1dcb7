//! Heartbeat monitor
//!
//! Checks the peer with echo messages on a fixed schedule. Each cycle is
//! `Idle -> EchoSent -> AwaitingResponse -> Success | Failure`; the echo
//! response arrives through the handler pipeline via [`HeartbeatMonitor::deliver_echo`].
//!
//! Consecutive failures are counted. Reaching the threshold raises a single
//! [`HeartbeatAlarm`] and resets the counter.

use franchise_core::{Clock, LocalTimeFields, Message};
use log::{Level, debug, error, log, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::HeartbeatConfig;
use crate::transport::MessageSender;

/// Why a heartbeat cycle failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoFailure {
    /// The echo could not be written
    WriteFailed,
    /// No response within the wait duration
    TimedOut,
    /// The response carried a non-success code
    Rejected,
}

/// Result of one heartbeat cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoOutcome {
    Success,
    Failure(EchoFailure),
}

/// Raised once the failure threshold is reached; asks for a reconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatAlarm {
    pub consecutive_failures: u32,
    pub last_failure: EchoFailure,
}

struct Waiter {
    echo_id: String,
    tx: oneshot::Sender<Message>,
}

pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    clock: Arc<dyn Clock>,
    failures: AtomicU32,
    /// At most one echo in flight
    waiting: Mutex<Option<Waiter>>,
    alarms: mpsc::Sender<HeartbeatAlarm>,
}

impl HeartbeatMonitor {
    /// Create a monitor and the receiving end of its alarm channel
    ///
    /// The channel holds one alarm; alarms raised while one is pending are
    /// dropped.
    pub fn new(
        config: HeartbeatConfig,
        clock: Arc<dyn Clock>,
    ) -> (Self, mpsc::Receiver<HeartbeatAlarm>) {
        let (alarms, rx) = mpsc::channel(1);
        let monitor = Self {
            config,
            clock,
            failures: AtomicU32::new(0),
            waiting: Mutex::new(None),
            alarms,
        };
        (monitor, rx)
    }

    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    /// Current consecutive-failure count
    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Run one heartbeat cycle through `sender`
    pub async fn beat(&self, sender: &dyn MessageSender) -> EchoOutcome {
        let fields = LocalTimeFields::from_clock(self.clock.as_ref(), "UTC");
        let echo_id = Uuid::new_v4().to_string();
        let request = Message::echo(echo_id.clone(), fields.time, fields.date);

        let (tx, rx) = oneshot::channel();
        *self.waiting.lock() = Some(Waiter {
            echo_id: echo_id.clone(),
            tx,
        });

        log!(
            self.echo_level(),
            "Sending echo {} (consecutive failures: {})",
            echo_id,
            self.failure_count()
        );

        if let Err(e) = sender.send(&request).await {
            self.waiting.lock().take();
            warn!("Echo {} could not be written: {}", echo_id, e);
            return self.record_failure(EchoFailure::WriteFailed);
        }

        match tokio::time::timeout(self.config.response_wait, rx).await {
            Ok(Ok(response)) if response.is_approved() => {
                log!(self.echo_level(), "Echo {} answered", echo_id);
                self.record_success()
            }
            Ok(Ok(response)) => {
                warn!(
                    "Echo {} rejected with code {:?}",
                    echo_id, response.f39
                );
                self.record_failure(EchoFailure::Rejected)
            }
            Ok(Err(_)) | Err(_) => {
                self.waiting.lock().take();
                warn!(
                    "No echo response for echo {} within {:?}",
                    echo_id, self.config.response_wait
                );
                self.record_failure(EchoFailure::TimedOut)
            }
        }
    }

    /// Hand an echo response to the waiting heartbeat
    ///
    /// Never blocks. Returns `false` when no heartbeat is waiting for it (late
    /// or unsolicited response), in which case it is dropped.
    pub fn deliver_echo(&self, response: Message) -> bool {
        let mut waiting = self.waiting.lock();
        let matches = match (waiting.as_ref(), response.request_id.as_deref()) {
            (None, _) => false,
            // Peers that do not echo the id are matched on arrival order
            (Some(_), None) => true,
            (Some(waiter), Some(id)) => waiter.echo_id == id,
        };
        if !matches {
            return false;
        }

        log!(self.echo_level(), "Echo response {:?}", response);
        match waiting.take() {
            Some(waiter) => waiter.tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Send an echo every `interval` until `shutdown` is cancelled
    pub async fn run_schedule(
        self: Arc<Self>,
        sender: Arc<dyn MessageSender>,
        shutdown: CancellationToken,
    ) {
        let period = self.config.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("Heartbeat schedule started, probing every {:?}", period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = self.beat(sender.as_ref()) => {}
                    }
                }
            }
        }

        debug!("Heartbeat schedule stopped");
    }

    fn record_success(&self) -> EchoOutcome {
        self.failures.store(0, Ordering::SeqCst);
        EchoOutcome::Success
    }

    fn record_failure(&self, failure: EchoFailure) -> EchoOutcome {
        let count = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.config.failure_threshold {
            self.failures.store(0, Ordering::SeqCst);
            error!(
                "Echo test failed {} times in a row, raising heartbeat alarm",
                count
            );
            let alarm = HeartbeatAlarm {
                consecutive_failures: count,
                last_failure: failure,
            };
            match self.alarms.try_send(alarm) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => debug!("Heartbeat alarm already pending, dropped"),
                Err(TrySendError::Closed(_)) => warn!("Nobody is listening to heartbeat alarms"),
            }
        }
        EchoOutcome::Failure(failure)
    }

    fn echo_level(&self) -> Level {
        if self.config.show_echo {
            Level::Info
        } else {
            Level::Debug
        }
    }
}
