use chrono::{DateTime, Utc};

mod correlation_key;

pub use correlation_key::CorrelationKey;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;
