//! HTTP front end tests
//!
//! Drive the router in-process with `tower::ServiceExt::oneshot`, first over
//! scripted senders, then over a full runtime talking to the simulated peer.

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use franchise_core::{FixedClock, Message, SystemClock};
use franchise_gateway::{
    CorrelationRegistry, FranchiseClient, GatewayConfig, GatewayError, GatewayResult,
    MessageSender, TcpConnectionFactory,
};
use franchise_runner::GatewayRuntime;
use franchise_runner::http::{AppState, create_router};
use franchise_sim::{FranchisePeer, PeerBehavior};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Answers every message itself, approving it
struct LoopbackSender {
    registry: CorrelationRegistry,
}

#[async_trait]
impl MessageSender for LoopbackSender {
    async fn send(&self, message: &Message) -> GatewayResult<()> {
        let key = message
            .correlation_key()
            .ok_or(GatewayError::MissingCorrelationKey)?;
        let mut response = message.clone();
        response.f39 = "00".to_string();
        response.f38 = "A1B2C3".to_string();
        self.registry.deliver(key, response)
    }
}

/// Accepts writes and never answers
struct SilentSender;

#[async_trait]
impl MessageSender for SilentSender {
    async fn send(&self, _message: &Message) -> GatewayResult<()> {
        Ok(())
    }
}

/// Every write fails
struct BrokenSender;

#[async_trait]
impl MessageSender for BrokenSender {
    async fn send(&self, _message: &Message) -> GatewayResult<()> {
        Err(GatewayError::NotConnected)
    }
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2024, 3, 14, 15, 30, 0).unwrap(),
    ))
}

fn router_with(sender: Arc<dyn MessageSender>, registry: CorrelationRegistry) -> Router {
    let client = FranchiseClient::new(sender, registry, Duration::from_millis(200));
    create_router(Arc::new(AppState::new(client, clock())))
}

fn loopback_router() -> Router {
    let registry = CorrelationRegistry::spawn();
    let sender = Arc::new(LoopbackSender {
        registry: registry.clone(),
    });
    router_with(sender, registry)
}

fn transaction_body() -> Value {
    json!({
        "transaction_reference": "ref-001",
        "card": { "number": "4111111111111111", "expiry_year": "25", "expiry_month": "12" },
        "amount": "100.00",
        "transaction_type": "0200",
        "timezone": "-05:00"
    })
}

fn json_request(method: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri("/transaction")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_healthcheck() {
    let request = Request::builder()
        .uri("/healthcheck")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(loopback_router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "healthy" }));
}

#[tokio::test]
async fn test_approved_transaction() {
    let (status, body) = send(loopback_router(), json_request("POST", &transaction_body())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mti"], "0200");
    assert_eq!(body["f2"], "4111111111111111");
    assert_eq!(body["f3"], "2512");
    assert_eq!(body["f4"], "100.00");
    // 15:30:00 UTC rendered at -05:00
    assert_eq!(body["f12"], "103000");
    assert_eq!(body["f13"], "0314");
    assert_eq!(body["f39"], "00");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn test_get_with_body_is_accepted() {
    let (status, body) = send(loopback_router(), json_request("GET", &transaction_body())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["f39"], "00");
}

#[tokio::test]
async fn test_body_without_content_type_is_accepted() {
    let request = Request::builder()
        .method("GET")
        .uri("/transaction")
        .body(Body::from(transaction_body().to_string()))
        .unwrap();

    let (status, body) = send(loopback_router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["f39"], "00");
    assert_eq!(body["f4"], "100.00");
}

#[tokio::test]
async fn test_empty_body_is_rejected() {
    let request = Request::builder()
        .method("GET")
        .uri("/transaction")
        .body(Body::empty())
        .unwrap();

    let (status, response) = send(loopback_router(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].as_str().unwrap().starts_with("invalid request body"));
}

#[tokio::test]
async fn test_missing_fields_are_rejected() {
    let cases = [
        ("transaction_reference", "validation error: transaction_reference not provided"),
        ("amount", "validation error: amount not provided"),
    ];
    for (field, expected) in cases {
        let mut body = transaction_body();
        body.as_object_mut().unwrap().remove(field);

        let (status, response) = send(loopback_router(), json_request("POST", &body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], expected);
    }

    let mut body = transaction_body();
    body["card"]["number"] = json!("");
    let (status, response) = send(loopback_router(), json_request("POST", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "validation error: card.number not provided");
}

#[tokio::test]
async fn test_non_decimal_amount_is_rejected() {
    let mut body = transaction_body();
    body["amount"] = json!("one hundred");

    let (status, response) = send(loopback_router(), json_request("POST", &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].as_str().unwrap().contains("amount"));
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let request = Request::builder()
        .method("POST")
        .uri("/transaction")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let (status, response) = send(loopback_router(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].is_string());
}

#[tokio::test]
async fn test_unanswered_transaction_returns_timeout_sentinel() {
    let registry = CorrelationRegistry::spawn();
    let app = router_with(Arc::new(SilentSender), registry.clone());

    let (status, body) = send(app, json_request("POST", &transaction_body())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["f39"], "TIMEOUT");
    assert_eq!(registry.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_write_failure_is_internal_error() {
    let registry = CorrelationRegistry::spawn();
    let app = router_with(Arc::new(BrokenSender), registry.clone());

    let (status, body) = send(app, json_request("POST", &transaction_body())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
    assert_eq!(registry.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_full_runtime_against_simulated_peer() {
    let _ = env_logger::try_init();
    let peer = FranchisePeer::bind("127.0.0.1:0", PeerBehavior::default())
        .await
        .unwrap();
    let (handle, _task) = peer.spawn();

    let config = GatewayConfig {
        franchise_address: handle.addr().to_string(),
        ..Default::default()
    };
    let factory = Arc::new(TcpConnectionFactory::new(config.franchise_address.clone()));
    let runtime = GatewayRuntime::start(config, factory).await.unwrap();
    let app = create_router(Arc::new(AppState::new(
        runtime.client(),
        Arc::new(SystemClock::new()),
    )));

    let (status, body) = send(app, json_request("POST", &transaction_body())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["f39"], "00");
    assert_eq!(body["f4"], "100.00");
    assert_eq!(body["f38"].as_str().unwrap().len(), 6);
    assert_eq!(handle.stats().transactions, 1);

    runtime.shutdown().await;
    handle.shutdown();
}
