use franchise_core::SystemClock;
use franchise_gateway::TcpConnectionFactory;
use franchise_runner::http::{AppState, create_router};
use franchise_runner::{GatewayRuntime, RunnerConfig, RunnerError};
use log::{error, info};
use std::sync::Arc;
use tokio::net::TcpListener;

fn print_help() {
    eprintln!(
        r#"Franchise Gateway - HTTP front end for a franchise authorization link

USAGE:
    franchise-gateway [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    GATEWAY_LISTEN_ADDR       HTTP listen address (default: 127.0.0.1:8080)
    FRANCHISE_ADDR            Franchise peer address (default: 127.0.0.1:9090)
    HEARTBEAT_INTERVAL_SECS   Seconds between echoes (default: 5)
    HEARTBEAT_WAIT_SECS       Seconds to wait for an echo response (default: 6)
    SHOW_ECHO                 Log heartbeat traffic at info level (default: false)
    REQUEST_TIMEOUT_SECS      Seconds a transaction waits for its response (default: 20)
    FRAME_READ_TIMEOUT_SECS   Deadline for reading one frame (default: 30)
    RECONNECT_ATTEMPTS        Reconnect attempts after a heartbeat alarm (default: 1)
    RECONNECT_BACKOFF_SECS    Pause between reconnect attempts (default: 1)
    RUST_LOG                  Log level filter

EXAMPLES:
    # Run with defaults
    franchise-gateway

    # Run with config file
    franchise-gateway --config gateway.json

    # Point at another franchise
    FRANCHISE_ADDR=10.0.0.5:9090 franchise-gateway
"#
    );
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return;
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = match &config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            RunnerConfig::from_file(path)
        }
        None => RunnerConfig::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!("Gateway stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: RunnerConfig) -> Result<(), RunnerError> {
    let factory = Arc::new(TcpConnectionFactory::new(
        config.gateway.franchise_address.clone(),
    ));
    let mut runtime = GatewayRuntime::start(config.gateway.clone(), factory).await?;

    let state = Arc::new(AppState::new(runtime.client(), Arc::new(SystemClock::new())));
    let app = create_router(state);
    let listener = TcpListener::bind(&config.listen_address).await?;

    info!("Starting Franchise Gateway");
    info!("HTTP API: http://{}/", config.listen_address);
    info!("Available endpoints:");
    info!("  GET  /healthcheck");
    info!("  GET  /transaction");
    info!("  POST /transaction");

    let stop = runtime.shutdown_token().child_token();
    let serve_stop = stop.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { serve_stop.cancelled().await })
            .await
    });

    let fatal = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutting down");
            None
        }
        fatal = runtime.wait_fatal() => fatal,
    };

    stop.cancel();
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP server failed: {}", e),
        Err(e) => error!("HTTP server task failed: {}", e),
    }
    runtime.shutdown().await;

    match fatal {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
