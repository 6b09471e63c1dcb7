//! HTTP front end
//!
//! Callers submit transactions as JSON; each one becomes a correlated
//! exchange with the franchise.

mod dto;
mod error;
mod handlers;
mod router;

pub use dto::*;
pub use error::ApiError;
pub use router::{AppState, create_router};
