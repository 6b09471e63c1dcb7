use franchise_core::ResponseCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{Result, SimError};

/// Response code used for random declines
pub const DECLINE_CODE: &str = "05";

/// How the peer answers
#[derive(Debug, Clone)]
pub struct PeerBehavior {
    /// Swallow echoes
    pub ignore_echo: bool,
    /// Swallow business transactions
    pub ignore_transactions: bool,
    /// `f39` on echo responses
    pub echo_response_code: String,
    /// `f39` on transaction responses that are not declined
    pub transaction_response_code: String,
    /// Share of transactions answered with [`DECLINE_CODE`], 0.0 to 1.0
    pub decline_rate: f64,
    /// Pause before each response
    pub response_delay: Duration,
}

impl Default for PeerBehavior {
    fn default() -> Self {
        Self {
            ignore_echo: false,
            ignore_transactions: false,
            echo_response_code: ResponseCode::APPROVED.to_string(),
            transaction_response_code: ResponseCode::APPROVED.to_string(),
            decline_rate: 0.0,
            response_delay: Duration::ZERO,
        }
    }
}

impl PeerBehavior {
    /// A peer that accepts frames and never answers
    pub fn silent() -> Self {
        Self {
            ignore_echo: true,
            ignore_transactions: true,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.decline_rate) {
            return Err(SimError::InvalidBehavior(format!(
                "decline rate {} is outside 0.0..=1.0",
                self.decline_rate
            )));
        }
        Ok(())
    }
}

/// Traffic counters, shared by every connection of one peer
#[derive(Debug, Default)]
pub struct PeerStats {
    connections: AtomicU64,
    sign_ons: AtomicU64,
    echoes: AtomicU64,
    transactions: AtomicU64,
    responses: AtomicU64,
}

/// Point-in-time copy of [`PeerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerStatsSnapshot {
    pub connections: u64,
    pub sign_ons: u64,
    pub echoes: u64,
    pub transactions: u64,
    pub responses: u64,
}

impl PeerStats {
    pub fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_sign_on(&self) {
        self.sign_ons.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_echo(&self) {
        self.echoes.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_transaction(&self) {
        self.transactions.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_response(&self) {
        self.responses.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> PeerStatsSnapshot {
        PeerStatsSnapshot {
            connections: self.connections.load(Ordering::SeqCst),
            sign_ons: self.sign_ons.load(Ordering::SeqCst),
            echoes: self.echoes.load(Ordering::SeqCst),
            transactions: self.transactions.load(Ordering::SeqCst),
            responses: self.responses.load(Ordering::SeqCst),
        }
    }
}
