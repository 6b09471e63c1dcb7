use franchise_core::Message;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::ApiError;

/// Business MTI used when the request names none
pub const DEFAULT_TRANSACTION_TYPE: &str = "0200";

/// Card-present transaction submitted by a caller
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionRequest {
    #[serde(default)]
    pub transaction_reference: String,
    #[serde(default)]
    pub card: Card,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub transaction_type: String,
    /// `UTC`, `Z` or a `±HH:MM` offset; anything else renders in UTC
    #[serde(default)]
    pub timezone: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Card {
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub expiry_year: String,
    #[serde(default)]
    pub expiry_month: String,
}

impl TransactionRequest {
    /// Check mandatory fields and the amount format
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.transaction_reference.trim().is_empty() {
            return Err(ApiError::missing_field("transaction_reference"));
        }
        if self.amount.trim().is_empty() {
            return Err(ApiError::missing_field("amount"));
        }
        if self.card.number.trim().is_empty() {
            return Err(ApiError::missing_field("card.number"));
        }
        if Decimal::from_str(self.amount.trim()).is_err() {
            return Err(ApiError::invalid_field(
                "amount",
                "must be a decimal number",
            ));
        }
        Ok(())
    }

    /// Build the business message; `f12`/`f13` come from the caller's clock
    pub fn to_message(&self, time: String, date: String) -> Message {
        let mti = if self.transaction_type.trim().is_empty() {
            DEFAULT_TRANSACTION_TYPE.to_string()
        } else {
            self.transaction_type.trim().to_string()
        };

        Message {
            mti,
            f2: self.card.number.clone(),
            f3: format!("{}{}", self.card.expiry_year, self.card.expiry_month),
            f4: self.amount.trim().to_string(),
            f12: time,
            f13: date,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
