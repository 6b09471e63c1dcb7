//! Error types for the gateway crate

use franchise_core::CodecError;
use thiserror::Error;

/// Gateway-level errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Transport error from the current connection, propagated unchanged
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Sign-on failed: {0}")]
    SignOn(String),

    #[error("Correlation registry closed")]
    RegistryClosed,

    /// A later registration for the same key took over the waiter's entry
    #[error("Pending request for {0} superseded by a newer registration")]
    Superseded(String),

    #[error("Message carries no correlation key")]
    MissingCorrelationKey,

    /// Every reconnect attempt failed; the process should be restarted
    #[error("Reconnect failed after {attempts} attempt(s): {source}")]
    ReconnectFailed {
        attempts: u32,
        #[source]
        source: Box<GatewayError>,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GatewayError {
    /// Whether the error requires the process to be restarted
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::ReconnectFailed { .. })
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
