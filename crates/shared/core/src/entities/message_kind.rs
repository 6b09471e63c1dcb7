use serde::{Deserialize, Serialize};

/// Message type tag used by heartbeat echoes and their responses
pub const ECHO_MTI: &str = "ECHO";

/// Message type tag of the sign-on handshake (ISO 8583 network management)
pub const SIGN_ON_MTI: &str = "0800";

/// Message variant, derived from the `mti` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Connection handshake, sent once per connection
    SignOn,
    /// Heartbeat Echo request or echo response
    Echo,
    /// Business transaction (authorization, sale, reversal...)
    Transaction,
}

impl MessageKind {
    /// Classify a raw message type tag
    pub fn from_mti(mti: &str) -> Self {
        match mti {
            ECHO_MTI => MessageKind::Echo,
            SIGN_ON_MTI => MessageKind::SignOn,
            _ => MessageKind::Transaction,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignOn => "sign_on",
            Self::Echo => "echo",
            Self::Transaction => "transaction",
        }
    }
}

/// Response codes carried in field 39
pub struct ResponseCode;

impl ResponseCode {
    /// Approved / echo successful
    pub const APPROVED: &'static str = "00";

    /// Sentinel returned to callers whose exchange timed out
    pub const TIMEOUT: &'static str = "TIMEOUT";
}
