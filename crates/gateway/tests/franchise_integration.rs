//! Integration test: Gateway <-> Franchise-Sim
//!
//! Runs the full stack (supervisor, heartbeat, reader, pipeline, registry,
//! client) against the simulated peer over real TCP and over in-memory pipes.

use franchise_core::{FrameCodec, Message, ResponseCode, SystemClock};
use franchise_gateway::{
    ConnectionFactory, ConnectionSupervisor, CorrelationDispatcher, CorrelationRegistry,
    DuplexConnectionFactory, ErrorReporting, ExchangeOutcome, FrameReader, FranchiseClient,
    GatewayConfig, GatewayError, GatewayResult, HeartbeatConfig, HeartbeatInterceptor,
    HeartbeatMonitor, PipelineBuilder, ReconnectPolicy, TcpConnectionFactory,
};
use franchise_sim::{FranchisePeer, PeerBehavior, PeerHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Stack {
    supervisor: Arc<ConnectionSupervisor>,
    registry: CorrelationRegistry,
    client: FranchiseClient,
    shutdown: CancellationToken,
    reader: JoinHandle<()>,
    supervision: JoinHandle<GatewayResult<()>>,
}

impl Stack {
    async fn start(config: GatewayConfig, factory: Arc<dyn ConnectionFactory>) -> Self {
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
        let pipeline = PipelineBuilder::new()
            .add(ErrorReporting)
            .add(HeartbeatInterceptor::new(monitor))
            .add(CorrelationDispatcher::new(registry.clone()))
            .build();

        supervisor
            .setup_connection()
            .await
            .expect("initial connection");

        let reader = FrameReader::new(supervisor.clone(), pipeline, config.reader.clone());
        let reader = tokio::spawn(reader.run(shutdown.clone()));
        let supervision = tokio::spawn(supervisor.clone().run(alarms));
        let client = FranchiseClient::new(
            supervisor.clone(),
            registry.clone(),
            config.request_timeout,
        );

        Self {
            supervisor,
            registry,
            client,
            shutdown,
            reader,
            supervision,
        }
    }

    async fn stop(self) {
        self.shutdown.cancel();
        self.supervisor.shutdown().await;
        self.registry.shutdown();
        self.reader.await.unwrap();
        let _ = self.supervision.await.unwrap();
    }
}

async fn start_peer(behavior: PeerBehavior) -> PeerHandle {
    let peer = FranchisePeer::bind("127.0.0.1:0", behavior).await.unwrap();
    let (handle, _task) = peer.spawn();
    handle
}

fn config_for(peer: &PeerHandle) -> GatewayConfig {
    GatewayConfig {
        franchise_address: peer.addr().to_string(),
        ..Default::default()
    }
}

fn fast_heartbeat() -> HeartbeatConfig {
    HeartbeatConfig {
        interval: Duration::from_millis(100),
        response_wait: Duration::from_millis(100),
        failure_threshold: 3,
        show_echo: true,
    }
}

fn transaction(amount: &str) -> Message {
    Message {
        mti: "0200".to_string(),
        f2: "4111111111111111".to_string(),
        f3: "2512".to_string(),
        f4: amount.to_string(),
        f12: "101500".to_string(),
        f13: "0314".to_string(),
        ..Default::default()
    }
}

async fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let started = tokio::time::Instant::now();
    while started.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

#[tokio::test]
async fn test_transaction_round_trip() {
    let _ = env_logger::try_init();
    let peer = start_peer(PeerBehavior::default()).await;
    let config = config_for(&peer);
    let factory = Arc::new(TcpConnectionFactory::new(config.franchise_address.clone()));
    let stack = Stack::start(config, factory).await;

    let outcome = stack.client.submit(transaction("100.00")).await.unwrap();

    let ExchangeOutcome::Response(response) = outcome else {
        panic!("expected a response, got {:?}", outcome);
    };
    assert_eq!(response.f39, ResponseCode::APPROVED);
    assert_eq!(response.f4, "100.00");
    assert_eq!(response.f38.len(), 6);
    assert_eq!(peer.stats().sign_ons, 1);

    stack.stop().await;
    peer.shutdown();
}

#[tokio::test]
async fn test_concurrent_callers_get_their_own_responses() {
    let peer = start_peer(PeerBehavior {
        response_delay: Duration::from_millis(20),
        ..Default::default()
    })
    .await;
    let config = config_for(&peer);
    let factory = Arc::new(TcpConnectionFactory::new(config.franchise_address.clone()));
    let stack = Stack::start(config, factory).await;

    let mut calls = Vec::new();
    for i in 0..20 {
        let client = stack.client.clone();
        calls.push(tokio::spawn(async move {
            let amount = format!("{}.00", i + 1);
            let outcome = client.submit(transaction(&amount)).await.unwrap();
            (amount, outcome.into_message())
        }));
    }

    for call in calls {
        let (amount, response) = call.await.unwrap();
        assert_eq!(response.f4, amount);
        assert_eq!(response.f39, "00");
    }
    assert_eq!(stack.registry.pending_count().await.unwrap(), 0);

    stack.stop().await;
    peer.shutdown();
}

#[tokio::test]
async fn test_unanswered_transaction_times_out() {
    let peer = start_peer(PeerBehavior {
        ignore_transactions: true,
        ..Default::default()
    })
    .await;
    let config = GatewayConfig {
        request_timeout: Duration::from_millis(300),
        ..config_for(&peer)
    };
    let factory = Arc::new(TcpConnectionFactory::new(config.franchise_address.clone()));
    let stack = Stack::start(config, factory).await;

    let outcome = stack.client.submit(transaction("100.00")).await.unwrap();

    assert!(outcome.is_timeout());
    assert_eq!(outcome.into_message().f39, ResponseCode::TIMEOUT);
    assert_eq!(stack.registry.pending_count().await.unwrap(), 0);

    stack.stop().await;
    peer.shutdown();
}

#[tokio::test]
async fn test_silent_heartbeat_triggers_one_reconnect() {
    let _ = env_logger::try_init();
    let peer = start_peer(PeerBehavior {
        ignore_echo: true,
        ..Default::default()
    })
    .await;
    let config = GatewayConfig {
        heartbeat: fast_heartbeat(),
        ..config_for(&peer)
    };
    let factory = Arc::new(TcpConnectionFactory::new(config.franchise_address.clone()));
    let stack = Stack::start(config, factory).await;
    let first_connection = stack.supervisor.connection_id().await;

    let supervisor = stack.supervisor.clone();
    assert!(wait_until(Duration::from_secs(5), || supervisor.reconnect_count() >= 1).await);
    peer.set_behavior(PeerBehavior::default()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(stack.supervisor.reconnect_count(), 1);
    assert_ne!(stack.supervisor.connection_id().await, first_connection);
    assert_eq!(peer.stats().connections, 2);
    assert_eq!(peer.stats().sign_ons, 2);

    // The replacement connection carries traffic
    let outcome = stack.client.submit(transaction("42.00")).await.unwrap();
    assert_eq!(outcome.into_message().f39, "00");

    stack.stop().await;
    peer.shutdown();
}

#[tokio::test]
async fn test_unreachable_peer_after_alarm_is_fatal() {
    let peer = start_peer(PeerBehavior::silent()).await;
    let config = GatewayConfig {
        heartbeat: fast_heartbeat(),
        reconnect: ReconnectPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(50),
        },
        ..config_for(&peer)
    };
    let factory = Arc::new(TcpConnectionFactory::new(config.franchise_address.clone()));
    let stack = Stack::start(config, factory).await;

    // Listener goes away: every reconnect attempt is refused
    peer.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(5), stack.supervision)
        .await
        .expect("supervision should end")
        .unwrap();
    let err = result.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        GatewayError::ReconnectFailed { attempts: 2, .. }
    ));

    stack.shutdown.cancel();
    stack.supervisor.shutdown().await;
    stack.reader.await.unwrap();
}

#[tokio::test]
async fn test_in_memory_peer_session() {
    let peer = FranchisePeer::bind("127.0.0.1:0", PeerBehavior::default())
        .await
        .unwrap();
    let handle = peer.handle();
    let (factory, mut pipes) = DuplexConnectionFactory::new(64 * 1024);

    // Every pipe the gateway opens is served by a simulated session
    let sessions = handle.clone();
    tokio::spawn(async move {
        while let Some(pipe) = pipes.recv().await {
            let session = sessions.session();
            tokio::spawn(session.serve(pipe));
        }
    });

    let stack = Stack::start(GatewayConfig::default(), Arc::new(factory)).await;
    let outcome = stack.client.submit(transaction("9.99")).await.unwrap();

    assert_eq!(outcome.into_message().f4, "9.99");
    assert_eq!(handle.stats().sign_ons, 1);
    assert_eq!(handle.stats().transactions, 1);

    stack.stop().await;
    handle.shutdown();
}
