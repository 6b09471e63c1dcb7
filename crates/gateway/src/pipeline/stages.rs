//! Pipeline stages used by the gateway

use async_trait::async_trait;
use franchise_core::{Message, MessageKind};
use log::{debug, warn};
use std::sync::Arc;

use super::{Interceptor, MessageHandler};
use crate::error::{GatewayError, GatewayResult};
use crate::heartbeat::HeartbeatMonitor;
use crate::registry::CorrelationRegistry;
use crate::transport::MessageSender;

/// Outermost stage: logs any error from the rest of the chain and returns it
pub struct ErrorReporting;

struct ErrorReportingHandler {
    next: Arc<dyn MessageHandler>,
}

impl Interceptor for ErrorReporting {
    fn wrap(&self, next: Arc<dyn MessageHandler>) -> Arc<dyn MessageHandler> {
        Arc::new(ErrorReportingHandler { next })
    }
}

#[async_trait]
impl MessageHandler for ErrorReportingHandler {
    async fn handle(&self, sender: &dyn MessageSender, message: Message) -> GatewayResult<()> {
        let mti = message.mti.clone();
        let result = self.next.handle(sender, message).await;
        if let Err(e) = &result {
            warn!("Handling message with mti {:?} failed: {}", mti, e);
        }
        result
    }
}

/// Routes echo responses to the heartbeat monitor
pub struct HeartbeatInterceptor {
    monitor: Arc<HeartbeatMonitor>,
}

impl HeartbeatInterceptor {
    pub fn new(monitor: Arc<HeartbeatMonitor>) -> Self {
        Self { monitor }
    }
}

struct HeartbeatHandler {
    monitor: Arc<HeartbeatMonitor>,
    next: Arc<dyn MessageHandler>,
}

impl Interceptor for HeartbeatInterceptor {
    fn wrap(&self, next: Arc<dyn MessageHandler>) -> Arc<dyn MessageHandler> {
        Arc::new(HeartbeatHandler {
            monitor: self.monitor.clone(),
            next,
        })
    }
}

#[async_trait]
impl MessageHandler for HeartbeatHandler {
    async fn handle(&self, sender: &dyn MessageSender, message: Message) -> GatewayResult<()> {
        if !message.is_echo() {
            return self.next.handle(sender, message).await;
        }
        if !self.monitor.deliver_echo(message) {
            debug!("Dropped echo response with no heartbeat waiting");
        }
        Ok(())
    }
}

/// Hands responses to the waiting caller through the correlation registry
///
/// Sign-on acknowledgements have no waiter and fall through to the end of
/// the chain. Any other message without a correlation key is an error.
pub struct CorrelationDispatcher {
    registry: CorrelationRegistry,
}

impl CorrelationDispatcher {
    pub fn new(registry: CorrelationRegistry) -> Self {
        Self { registry }
    }
}

struct DispatchHandler {
    registry: CorrelationRegistry,
    next: Arc<dyn MessageHandler>,
}

impl Interceptor for CorrelationDispatcher {
    fn wrap(&self, next: Arc<dyn MessageHandler>) -> Arc<dyn MessageHandler> {
        Arc::new(DispatchHandler {
            registry: self.registry.clone(),
            next,
        })
    }
}

#[async_trait]
impl MessageHandler for DispatchHandler {
    async fn handle(&self, sender: &dyn MessageSender, message: Message) -> GatewayResult<()> {
        if message.kind() == MessageKind::SignOn {
            return self.next.handle(sender, message).await;
        }
        let key = message
            .correlation_key()
            .ok_or(GatewayError::MissingCorrelationKey)?;
        self.registry.deliver(key, message)
    }
}
