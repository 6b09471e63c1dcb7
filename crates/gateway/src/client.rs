//! Request/response client
//!
//! Any number of callers share one connection. Each exchange registers its
//! correlation key first, then writes the request, then waits for the
//! matching response or the request timeout.

use franchise_core::Message;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::registry::CorrelationRegistry;
use crate::transport::MessageSender;

/// Result of one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The peer answered; its response code may still be a decline
    Response(Message),
    /// Nothing arrived in time
    TimedOut,
}

impl ExchangeOutcome {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExchangeOutcome::TimedOut)
    }

    /// The response, or the timeout sentinel
    pub fn into_message(self) -> Message {
        match self {
            ExchangeOutcome::Response(message) => message,
            ExchangeOutcome::TimedOut => Message::timeout_sentinel(),
        }
    }
}

#[derive(Clone)]
pub struct FranchiseClient {
    sender: Arc<dyn MessageSender>,
    registry: CorrelationRegistry,
    timeout: Duration,
}

impl FranchiseClient {
    pub fn new(
        sender: Arc<dyn MessageSender>,
        registry: CorrelationRegistry,
        timeout: Duration,
    ) -> Self {
        Self {
            sender,
            registry,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Tag `request` with a fresh request id and exchange it
    pub async fn submit(&self, request: Message) -> GatewayResult<ExchangeOutcome> {
        let request = request.with_request_id(Uuid::new_v4().to_string());
        self.exchange(request).await
    }

    /// Send `request` and wait for the response carrying the same key
    ///
    /// A write failure is returned immediately. A timeout abandons only this
    /// caller's wait; the request already on the wire is not recalled.
    pub async fn exchange(&self, request: Message) -> GatewayResult<ExchangeOutcome> {
        let key = request
            .correlation_key()
            .ok_or(GatewayError::MissingCorrelationKey)?;
        let pending = self.registry.register(key.clone())?;

        if let Err(e) = self.sender.send(&request).await {
            warn!("Sending request {} failed: {}", key, e);
            return Err(e);
        }
        debug!("Request {} sent, waiting up to {:?}", key, self.timeout);

        match pending.wait(self.timeout).await? {
            Some(response) => Ok(ExchangeOutcome::Response(response)),
            None => {
                warn!("No response for {} within {:?}", key, self.timeout);
                Ok(ExchangeOutcome::TimedOut)
            }
        }
    }
}

impl std::fmt::Debug for FranchiseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FranchiseClient")
            .field("timeout", &self.timeout)
            .finish()
    }
}
