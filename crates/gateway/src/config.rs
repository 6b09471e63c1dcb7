//! Gateway configuration
//!
//! Fixed at process start. Loading (file, environment) lives in the runner.

use std::time::Duration;

use franchise_core::{DEFAULT_MAX_FRAME_LEN, FrameCodec, MAX_HEADER_LEN_VALUE, Message};

use crate::error::{GatewayError, GatewayResult};

/// Heartbeat schedule and failure policy
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Time between echoes
    pub interval: Duration,
    /// How long an echo waits for its echo response
    pub response_wait: Duration,
    /// Consecutive failures that raise the reconnect alarm
    pub failure_threshold: u32,
    /// Log every echo and response at info level
    pub show_echo: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            response_wait: Duration::from_secs(6),
            failure_threshold: 3,
            show_echo: false,
        }
    }
}

/// Frame reader timings and limits
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Deadline for reading one frame body
    pub frame_deadline: Duration,
    /// Pause after a failed header read
    pub header_backoff: Duration,
    /// Largest accepted frame body
    pub max_frame_len: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            frame_deadline: Duration::from_secs(30),
            header_backoff: Duration::from_secs(1),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// How many times the supervisor tries to re-establish a dead connection
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    /// Pause between two failed attempts
    pub backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Upstream franchise peer, `host:port`
    pub franchise_address: String,
    pub heartbeat: HeartbeatConfig,
    pub reader: ReaderConfig,
    pub reconnect: ReconnectPolicy,
    /// How long a caller waits for its correlated response
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            franchise_address: "127.0.0.1:9090".to_string(),
            heartbeat: HeartbeatConfig::default(),
            reader: ReaderConfig::default(),
            reconnect: ReconnectPolicy::default(),
            request_timeout: Duration::from_secs(20),
        }
    }
}

impl GatewayConfig {
    /// Validate the configuration
    pub fn validate(&self) -> GatewayResult<()> {
        if self.franchise_address.trim().is_empty() {
            return Err(GatewayError::Config("franchise address is empty".into()));
        }
        if self.heartbeat.interval.is_zero() {
            return Err(GatewayError::Config("heartbeat interval must be > 0".into()));
        }
        if self.heartbeat.response_wait.is_zero() {
            return Err(GatewayError::Config(
                "heartbeat response wait must be > 0".into(),
            ));
        }
        if self.heartbeat.failure_threshold == 0 {
            return Err(GatewayError::Config(
                "heartbeat failure threshold must be >= 1".into(),
            ));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(GatewayError::Config(
                "reconnect attempts must be >= 1".into(),
            ));
        }
        if self.request_timeout.is_zero() || self.reader.frame_deadline.is_zero() {
            return Err(GatewayError::Config("timeouts must be > 0".into()));
        }
        if self.reader.max_frame_len > MAX_HEADER_LEN_VALUE {
            return Err(GatewayError::Config(format!(
                "max frame length must be <= {}",
                MAX_HEADER_LEN_VALUE
            )));
        }
        // Every connection starts with a sign-on: it has to fit
        if FrameCodec::new(self.reader.max_frame_len)
            .encode(&Message::sign_on())
            .is_err()
        {
            return Err(GatewayError::Config(format!(
                "max frame length {} cannot hold a sign-on",
                self.reader.max_frame_len
            )));
        }
        Ok(())
    }
}
