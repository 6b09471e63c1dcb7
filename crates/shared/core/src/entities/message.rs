use serde::{Deserialize, Serialize};

use super::message_kind::{ECHO_MTI, MessageKind, ResponseCode, SIGN_ON_MTI};
use crate::values::CorrelationKey;

/// One protocol exchange unit on the wire
///
/// Field names follow ISO 8583 data element numbers and are part of the
/// wire contract: they must stay stable across versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message type indicator
    #[serde(default)]
    pub mti: String,
    /// Explicit correlation identifier, echoed back by the peer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Card number
    #[serde(default)]
    pub f2: String,
    /// Card expiry (YYMM)
    #[serde(default)]
    pub f3: String,
    /// Amount
    #[serde(default)]
    pub f4: String,
    /// Local transaction time (HHMMSS)
    #[serde(default)]
    pub f12: String,
    /// Local transaction date (MMDD)
    #[serde(default)]
    pub f13: String,
    /// Authorization code
    #[serde(default)]
    pub f38: String,
    /// Response code
    #[serde(default)]
    pub f39: String,
}

impl Message {
    /// Create the sign-on handshake message
    pub fn sign_on() -> Self {
        Self {
            mti: SIGN_ON_MTI.to_string(),
            ..Default::default()
        }
    }

    /// Create a heartbeat echo
    pub fn echo(
        request_id: impl Into<String>,
        time: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            mti: ECHO_MTI.to_string(),
            request_id: Some(request_id.into()),
            f12: time.into(),
            f13: date.into(),
            ..Default::default()
        }
    }

    /// Sentinel handed to a caller whose exchange was not answered in time
    pub fn timeout_sentinel() -> Self {
        Self {
            f39: ResponseCode::TIMEOUT.to_string(),
            ..Default::default()
        }
    }

    /// Set the explicit correlation identifier
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::from_mti(&self.mti)
    }

    pub fn is_echo(&self) -> bool {
        self.kind() == MessageKind::Echo
    }

    /// Response code is "00"
    pub fn is_approved(&self) -> bool {
        self.f39 == ResponseCode::APPROVED
    }

    /// Key binding this message to its outstanding exchange
    ///
    /// The explicit `request_id` wins. Peers that do not echo it back are
    /// matched on `f12 + f13`, which collides for two requests issued within
    /// the same second; `None` when neither is available.
    pub fn correlation_key(&self) -> Option<CorrelationKey> {
        match self.request_id.as_deref() {
            Some(id) if !id.is_empty() => Some(CorrelationKey::explicit(id)),
            _ if !self.f12.is_empty() || !self.f13.is_empty() => {
                Some(CorrelationKey::derived(&self.f12, &self.f13))
            }
            _ => None,
        }
    }
}
