//! Bootstrap - gateway process wiring
//!
//! Builds the gateway stack in dependency order:
//! - Correlation registry and heartbeat monitor
//! - Connection supervisor, then the first connection and sign-on
//! - Handler pipeline and frame reader
//! - Supervision loop consuming heartbeat alarms

use franchise_core::{FrameCodec, SystemClock};
use franchise_gateway::{
    ConnectionFactory, ConnectionSupervisor, CorrelationDispatcher, CorrelationRegistry,
    ErrorReporting, FrameReader, FranchiseClient, GatewayConfig, GatewayError, GatewayResult,
    HeartbeatInterceptor, HeartbeatMonitor, PipelineBuilder,
};
use log::{debug, error, info};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running gateway: connection, reader and supervision tasks
pub struct GatewayRuntime {
    supervisor: Arc<ConnectionSupervisor>,
    registry: CorrelationRegistry,
    client: FranchiseClient,
    shutdown: CancellationToken,
    reader: Option<JoinHandle<()>>,
    supervision: Option<JoinHandle<GatewayResult<()>>>,
}

impl GatewayRuntime {
    /// Connect, sign on and start the background tasks
    ///
    /// Fails when the first connection or its sign-on fails.
    pub async fn start(
        config: GatewayConfig,
        factory: Arc<dyn ConnectionFactory>,
    ) -> GatewayResult<Self> {
        config.validate()?;
        let shutdown = CancellationToken::new();

        let registry = CorrelationRegistry::spawn();
        let (monitor, alarms) =
            HeartbeatMonitor::new(config.heartbeat.clone(), Arc::new(SystemClock::new()));
        let monitor = Arc::new(monitor);

        let supervisor = Arc::new(ConnectionSupervisor::new(
            factory,
            monitor.clone(),
            FrameCodec::new(config.reader.max_frame_len),
            config.reconnect.clone(),
            shutdown.clone(),
        ));

        // Echoes are consumed before the dispatcher sees them
        let pipeline = PipelineBuilder::new()
            .add(ErrorReporting)
            .add(HeartbeatInterceptor::new(monitor))
            .add(CorrelationDispatcher::new(registry.clone()))
            .build();
        debug!("Handler pipeline: {:?}", pipeline);

        if let Err(e) = supervisor.setup_connection().await {
            error!("Initial connection to the franchise failed: {}", e);
            supervisor.shutdown().await;
            registry.shutdown();
            return Err(e);
        }

        let reader = FrameReader::new(supervisor.clone(), pipeline, config.reader.clone());
        let reader = tokio::spawn(reader.run(shutdown.clone()));
        let supervision = tokio::spawn(supervisor.clone().run(alarms));

        let client = FranchiseClient::new(
            supervisor.clone(),
            registry.clone(),
            config.request_timeout,
        );

        info!("Gateway connected to {}", config.franchise_address);

        Ok(Self {
            supervisor,
            registry,
            client,
            shutdown,
            reader: Some(reader),
            supervision: Some(supervision),
        })
    }

    pub fn client(&self) -> FranchiseClient {
        self.client.clone()
    }

    pub fn supervisor(&self) -> &Arc<ConnectionSupervisor> {
        &self.supervisor
    }

    pub fn registry(&self) -> &CorrelationRegistry {
        &self.registry
    }

    /// Token cancelled when the runtime shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wait for the supervision loop to end
    ///
    /// Returns the fatal error that stopped it, `None` on a clean stop.
    /// Pends forever once the loop has already been awaited.
    pub async fn wait_fatal(&mut self) -> Option<GatewayError> {
        let Some(supervision) = self.supervision.as_mut() else {
            return std::future::pending().await;
        };

        let result = supervision.await;
        self.supervision = None;
        match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(e) => Some(GatewayError::Connect(format!(
                "supervision task failed: {}",
                e
            ))),
        }
    }

    /// Stop every task and close the connection
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        self.supervisor.shutdown().await;
        self.registry.shutdown();

        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                error!("Frame reader task failed: {}", e);
            }
        }
        if let Some(supervision) = self.supervision.take() {
            match supervision.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Supervision ended with: {}", e),
                Err(e) => error!("Supervision task failed: {}", e),
            }
        }
        info!("Gateway stopped");
    }
}
