use axum::{Router, routing::get};
use franchise_core::Clock;
use franchise_gateway::FranchiseClient;
use std::sync::Arc;

use super::handlers;

/// Application state shared across handlers
pub struct AppState {
    pub client: FranchiseClient,
    /// Source of the local time fields stamped on each transaction
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(client: FranchiseClient, clock: Arc<dyn Clock>) -> Self {
        AppState { client, clock }
    }
}

/// Create the REST API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthcheck", get(handlers::healthcheck))
        .route(
            "/transaction",
            get(handlers::transaction).post(handlers::transaction),
        )
        .with_state(state)
}
