//! Franchise Gateway
//!
//! Connection lifecycle and message correlation engine. Provides:
//! - A supervised connection to the franchise with sign-on and reconnect
//! - An echo heartbeat that raises an alarm after repeated failures
//! - A length-prefixed frame reader feeding an ordered handler pipeline
//! - An actor-owned correlation registry and the request/response client
//!
//! ## Architecture
//!
//! ```text
//!   callers ──register──► CorrelationRegistry ◄──deliver── CorrelationDispatcher
//!      │                                                        ▲
//!      └──send──► ConnectionSupervisor ──► franchise            │
//!                      ▲        │                               │
//!        alarms ───────┘        └──► FrameReader ──► Pipeline ──┤
//!          ▲                                                    │
//!          └────────────── HeartbeatMonitor ◄── echo ───────────┘
//! ```
//!
//! ## Transport
//!
//! Connections come from an injected [`ConnectionFactory`]: TCP in
//! production, in-memory duplex pipes in tests.

pub mod client;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod pipeline;
pub mod reader;
pub mod registry;
pub mod sign_on;
pub mod supervisor;
pub mod transport;

// Re-export commonly used types
pub use client::{ExchangeOutcome, FranchiseClient};
pub use config::{GatewayConfig, HeartbeatConfig, ReaderConfig, ReconnectPolicy};
pub use error::{GatewayError, GatewayResult};
pub use heartbeat::{HeartbeatAlarm, HeartbeatMonitor, EchoFailure, EchoOutcome};
pub use pipeline::{
    CorrelationDispatcher, ErrorReporting, HeartbeatInterceptor, Interceptor, MessageHandler,
    Pipeline, PipelineBuilder,
};
pub use reader::FrameReader;
pub use registry::{CorrelationRegistry, PendingResponse};
pub use sign_on::SignOn;
pub use supervisor::{ConnectionState, ConnectionSupervisor};
pub use transport::{
    Connection, ConnectionFactory, DuplexConnectionFactory, MessageSender, TcpConnectionFactory,
};
