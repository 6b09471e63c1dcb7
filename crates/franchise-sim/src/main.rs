//! Standalone franchise peer
//!
//! Environment:
//! - `SIM_ADDR` listen address (default `127.0.0.1:9090`)
//! - `SIM_DECLINE_RATE` share of transactions declined (default 0)
//! - `SIM_RESPONSE_DELAY_MS` pause before each response (default 0)
//! - `SIM_IGNORE_ECHO` set to `true` to swallow echoes

use franchise_sim::{FranchisePeer, PeerBehavior};
use log::{error, info};
use std::time::Duration;

const DEFAULT_ADDR: &str = "127.0.0.1:9090";

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr = std::env::var("SIM_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let behavior = PeerBehavior {
        decline_rate: env_parse("SIM_DECLINE_RATE").unwrap_or(0.0),
        response_delay: Duration::from_millis(env_parse("SIM_RESPONSE_DELAY_MS").unwrap_or(0)),
        ignore_echo: env_parse("SIM_IGNORE_ECHO").unwrap_or(false),
        ..Default::default()
    };

    let peer = match FranchisePeer::bind(&addr, behavior).await {
        Ok(peer) => peer,
        Err(e) => {
            error!("Failed to start franchise peer on {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    let (handle, task) = peer.spawn();
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }
    info!("Shutting down, stats: {:?}", handle.stats());
    handle.shutdown();

    match task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Franchise peer failed: {}", e),
        Err(e) => error!("Franchise peer task panicked: {}", e),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
