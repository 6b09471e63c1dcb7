use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use franchise_gateway::GatewayError;

use super::dto::ErrorResponse;

/// API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self::bad_request(format!("validation error: {} not provided", field))
    }

    pub fn invalid_field(field: &str, reason: &str) -> Self {
        Self::bad_request(format!("validation error: {} {}", field, reason))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("invalid request body: {}", err))
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        log::error!("Transaction failed: {}", err);
        Self::internal("internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API Error {}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}
