//! Inbound handler pipeline
//!
//! Every decoded message runs through an ordered chain of interceptors,
//! composed once at start-up. A stage either consumes the message or passes
//! it to the next one:
//!
//! ```text
//! ErrorReporting -> HeartbeatInterceptor -> CorrelationDispatcher -> terminal
//! ```

pub mod stages;

pub use stages::{CorrelationDispatcher, ErrorReporting, HeartbeatInterceptor};

use async_trait::async_trait;
use franchise_core::Message;
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::transport::MessageSender;

/// One step of inbound message handling
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle a message read from the connection behind `sender`
    async fn handle(&self, sender: &dyn MessageSender, message: Message) -> GatewayResult<()>;
}

/// A pipeline stage: wraps the rest of the chain
pub trait Interceptor: Send + Sync {
    fn wrap(&self, next: Arc<dyn MessageHandler>) -> Arc<dyn MessageHandler>;
}

/// End of the chain; messages reaching it are dropped
struct Terminal;

#[async_trait]
impl MessageHandler for Terminal {
    async fn handle(&self, _sender: &dyn MessageSender, message: Message) -> GatewayResult<()> {
        log::debug!("No handler for message with mti {:?}", message.mti);
        Ok(())
    }
}

/// Collects stages in call order
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Interceptor>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage; the first added sees messages first
    pub fn add(mut self, stage: impl Interceptor + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Compose the chain
    pub fn build(self) -> Pipeline {
        let terminal: Arc<dyn MessageHandler> = Arc::new(Terminal);
        let head = self
            .stages
            .iter()
            .rev()
            .fold(terminal, |next, stage| stage.wrap(next));
        Pipeline {
            head,
            stages: self.stages.len(),
        }
    }
}

/// A composed, immutable handler chain
#[derive(Clone)]
pub struct Pipeline {
    head: Arc<dyn MessageHandler>,
    stages: usize,
}

impl Pipeline {
    pub async fn handle(&self, sender: &dyn MessageSender, message: Message) -> GatewayResult<()> {
        self.head.handle(sender, message).await
    }

    /// Number of stages before the terminal one
    pub fn len(&self) -> usize {
        self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages == 0
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("stages", &self.stages).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use parking_lot::Mutex;

    struct NullSender;

    #[async_trait]
    impl MessageSender for NullSender {
        async fn send(&self, _message: &Message) -> GatewayResult<()> {
            Ok(())
        }
    }

    /// Records its name and forwards
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        consume: bool,
    }

    struct RecorderHandler {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        consume: bool,
        next: Arc<dyn MessageHandler>,
    }

    impl Interceptor for Recorder {
        fn wrap(&self, next: Arc<dyn MessageHandler>) -> Arc<dyn MessageHandler> {
            Arc::new(RecorderHandler {
                name: self.name,
                log: self.log.clone(),
                consume: self.consume,
                next,
            })
        }
    }

    #[async_trait]
    impl MessageHandler for RecorderHandler {
        async fn handle(&self, sender: &dyn MessageSender, message: Message) -> GatewayResult<()> {
            self.log.lock().push(self.name);
            if self.consume {
                return Ok(());
            }
            self.next.handle(sender, message).await
        }
    }

    struct Failing;

    struct FailingHandler;

    impl Interceptor for Failing {
        fn wrap(&self, _next: Arc<dyn MessageHandler>) -> Arc<dyn MessageHandler> {
            Arc::new(FailingHandler)
        }
    }

    #[async_trait]
    impl MessageHandler for FailingHandler {
        async fn handle(&self, _sender: &dyn MessageSender, _message: Message) -> GatewayResult<()> {
            Err(GatewayError::MissingCorrelationKey)
        }
    }

    fn recorder(
        name: &'static str,
        log: &Arc<Mutex<Vec<&'static str>>>,
        consume: bool,
    ) -> Recorder {
        Recorder {
            name,
            log: log.clone(),
            consume,
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_insertion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = PipelineBuilder::new()
            .add(recorder("first", &log, false))
            .add(recorder("second", &log, false))
            .add(recorder("third", &log, false))
            .build();

        pipeline
            .handle(&NullSender, Message::sign_on())
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
        assert_eq!(pipeline.len(), 3);
    }

    #[tokio::test]
    async fn test_consuming_stage_stops_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = PipelineBuilder::new()
            .add(recorder("first", &log, true))
            .add(recorder("second", &log, false))
            .build();

        pipeline
            .handle(&NullSender, Message::sign_on())
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_errors_reach_the_caller() {
        let pipeline = PipelineBuilder::new()
            .add(ErrorReporting)
            .add(Failing)
            .build();

        assert!(matches!(
            pipeline.handle(&NullSender, Message::sign_on()).await,
            Err(GatewayError::MissingCorrelationKey)
        ));
    }

    #[tokio::test]
    async fn test_empty_pipeline_drops_messages() {
        let pipeline = PipelineBuilder::new().build();
        assert!(pipeline.is_empty());
        assert!(pipeline.handle(&NullSender, Message::sign_on()).await.is_ok());
    }
}
