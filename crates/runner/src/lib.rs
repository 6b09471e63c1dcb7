//! Franchise Runner - gateway process
//!
//! Wires the gateway into a running service:
//!
//! - **Config**: JSON file or environment variables over the defaults
//! - **Bootstrap**: builds the gateway stack and owns its tasks
//! - **HTTP**: transaction submission and liveness endpoints
//!
//! ## Architecture
//!
//! ```text
//!   HTTP caller
//!       │ JSON
//!       ▼
//! ┌──────────────┐   submit    ┌──────────────────┐
//! │  http router │ ──────────► │  FranchiseClient │
//! └──────────────┘             └────────┬─────────┘
//!                                       │ frames
//!                                       ▼
//!                              ┌──────────────────┐
//!                              │  GatewayRuntime  │ ◄── heartbeat alarms
//!                              └────────┬─────────┘
//!                                       │ TCP
//!                                       ▼
//!                                   franchise
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod http;

// Re-export main types
pub use bootstrap::GatewayRuntime;
pub use config::RunnerConfig;
pub use error::{Result, RunnerError};
