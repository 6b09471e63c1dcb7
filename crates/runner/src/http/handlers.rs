use axum::{Json, body::Bytes, extract::State};
use franchise_core::{LocalTimeFields, Message};
use log::{info, warn};
use std::sync::Arc;

use super::AppState;
use super::dto::{HealthResponse, TransactionRequest};
use super::error::ApiError;

/// GET /healthcheck
pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "healthy".to_string(),
    })
}

/// GET|POST /transaction
///
/// The body is decoded as JSON whatever the `Content-Type`; callers send
/// it on a GET without one. Answers 200 with the peer's response, or with
/// the `TIMEOUT` sentinel when none arrives in time.
pub async fn transaction(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Message>, ApiError> {
    let request: TransactionRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!("Rejected transaction body: {}", e);
        ApiError::from(e)
    })?;

    if let Err(e) = request.validate() {
        warn!(
            "Invalid transaction '{}': {}",
            request.transaction_reference, e.message
        );
        return Err(e);
    }

    let fields = LocalTimeFields::from_clock(state.clock.as_ref(), &request.timezone);
    let message = request.to_message(fields.time, fields.date);

    let outcome = state.client.submit(message).await?;
    if outcome.is_timeout() {
        warn!(
            "Transaction '{}' timed out",
            request.transaction_reference
        );
    }

    let response = outcome.into_message();
    info!(
        "Transaction '{}' answered with {}",
        request.transaction_reference, response.f39
    );
    Ok(Json(response))
}
