//! Simulated franchise peer
//!
//! Accepts gateway connections over TCP and answers every frame with a copy
//! of the request carrying a response code and an authorization code. Its
//! behavior can be changed while it runs, so tests can make it go silent,
//! decline, or answer slowly.

// Application layer
pub mod application;

// Infrastructure layer
pub mod infrastructure;

// Cross-cutting concerns
pub mod error;
pub mod model;

// Re-export main types for convenience
pub use application::{FranchisePeer, PeerHandle};
pub use error::{Result, SimError};
pub use model::{PeerBehavior, PeerStats, PeerStatsSnapshot};
