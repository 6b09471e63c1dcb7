use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier binding an outbound request to its inbound response
///
/// Unique among concurrently outstanding exchanges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    /// Key taken from an explicit caller-generated identifier
    pub fn explicit(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Key derived from the local time and date fields
    pub fn derived(time: &str, date: &str) -> Self {
        Self(format!("{}{}", time, date))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CorrelationKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}
