//! Runner configuration
//!
//! Loaded once at start-up, either from a JSON file or from environment
//! variables layered over the defaults. Every key is optional.

use franchise_gateway::{GatewayConfig, GatewayError, GatewayResult};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Process configuration: HTTP listener plus the gateway core
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub listen_address: String,
    pub gateway: GatewayConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDR.to_string(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// On-disk layout; absent keys keep their default
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    listen_address: Option<String>,
    franchise_address: Option<String>,
    heartbeat_interval_secs: Option<u64>,
    heartbeat_wait_secs: Option<u64>,
    heartbeat_failure_threshold: Option<u32>,
    show_echo: Option<bool>,
    request_timeout_secs: Option<u64>,
    frame_read_timeout_secs: Option<u64>,
    max_frame_len: Option<usize>,
    reconnect_attempts: Option<u32>,
    reconnect_backoff_secs: Option<u64>,
}

impl RunnerConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> GatewayResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            GatewayError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> GatewayResult<Self> {
        let file: FileConfig =
            serde_json::from_str(json).map_err(|e| GatewayError::Config(e.to_string()))?;

        let mut config = Self::default();
        let gw = &mut config.gateway;
        if let Some(v) = file.listen_address {
            config.listen_address = v;
        }
        if let Some(v) = file.franchise_address {
            gw.franchise_address = v;
        }
        if let Some(v) = file.heartbeat_interval_secs {
            gw.heartbeat.interval = Duration::from_secs(v);
        }
        if let Some(v) = file.heartbeat_wait_secs {
            gw.heartbeat.response_wait = Duration::from_secs(v);
        }
        if let Some(v) = file.heartbeat_failure_threshold {
            gw.heartbeat.failure_threshold = v;
        }
        if let Some(v) = file.show_echo {
            gw.heartbeat.show_echo = v;
        }
        if let Some(v) = file.request_timeout_secs {
            gw.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.frame_read_timeout_secs {
            gw.reader.frame_deadline = Duration::from_secs(v);
        }
        if let Some(v) = file.max_frame_len {
            gw.reader.max_frame_len = v;
        }
        if let Some(v) = file.reconnect_attempts {
            gw.reconnect.max_attempts = v;
        }
        if let Some(v) = file.reconnect_backoff_secs {
            gw.reconnect.backoff = Duration::from_secs(v);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from the process environment
    pub fn from_env() -> GatewayResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> GatewayResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let gw = &mut config.gateway;

        if let Some(v) = lookup("GATEWAY_LISTEN_ADDR") {
            config.listen_address = v;
        }
        if let Some(v) = lookup("FRANCHISE_ADDR") {
            gw.franchise_address = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "HEARTBEAT_INTERVAL_SECS")? {
            gw.heartbeat.interval = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "HEARTBEAT_WAIT_SECS")? {
            gw.heartbeat.response_wait = Duration::from_secs(v);
        }
        if let Some(v) = lookup("SHOW_ECHO") {
            gw.heartbeat.show_echo = parse_flag("SHOW_ECHO", &v)?;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "REQUEST_TIMEOUT_SECS")? {
            gw.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "FRAME_READ_TIMEOUT_SECS")? {
            gw.reader.frame_deadline = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u32, _>(&lookup, "RECONNECT_ATTEMPTS")? {
            gw.reconnect.max_attempts = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "RECONNECT_BACKOFF_SECS")? {
            gw.reconnect.backoff = Duration::from_secs(v);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.listen_address.trim().is_empty() {
            return Err(GatewayError::Config("listen address is empty".into()));
        }
        self.gateway.validate()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> GatewayResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| GatewayError::Config(format!("{}: invalid value '{}'", key, raw))),
    }
}

fn parse_flag(key: &str, raw: &str) -> GatewayResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(GatewayError::Config(format!(
            "{}: invalid flag '{}'",
            key, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = RunnerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.listen_address, "127.0.0.1:8080");
        assert_eq!(config.gateway.franchise_address, "127.0.0.1:9090");
        assert_eq!(config.gateway.heartbeat.interval, Duration::from_secs(5));
        assert!(!config.gateway.heartbeat.show_echo);
    }

    #[test]
    fn test_environment_overrides() {
        let config = RunnerConfig::from_lookup(lookup(&[
            ("GATEWAY_LISTEN_ADDR", "0.0.0.0:8000"),
            ("FRANCHISE_ADDR", "10.0.0.5:9090"),
            ("HEARTBEAT_INTERVAL_SECS", "10"),
            ("HEARTBEAT_WAIT_SECS", "4"),
            ("SHOW_ECHO", "true"),
            ("RECONNECT_ATTEMPTS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.listen_address, "0.0.0.0:8000");
        assert_eq!(config.gateway.franchise_address, "10.0.0.5:9090");
        assert_eq!(config.gateway.heartbeat.interval, Duration::from_secs(10));
        assert_eq!(config.gateway.heartbeat.response_wait, Duration::from_secs(4));
        assert!(config.gateway.heartbeat.show_echo);
        assert_eq!(config.gateway.reconnect.max_attempts, 3);
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let result = RunnerConfig::from_lookup(lookup(&[("HEARTBEAT_INTERVAL_SECS", "soon")]));
        assert!(matches!(result, Err(GatewayError::Config(msg)) if msg.contains("HEARTBEAT_INTERVAL_SECS")));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = RunnerConfig::from_lookup(lookup(&[("HEARTBEAT_INTERVAL_SECS", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_json_partial_file() {
        let config = RunnerConfig::from_json(
            r#"{ "franchise_address": "peer:9090", "request_timeout_secs": 5, "show_echo": true }"#,
        )
        .unwrap();

        assert_eq!(config.gateway.franchise_address, "peer:9090");
        assert_eq!(config.gateway.request_timeout, Duration::from_secs(5));
        assert!(config.gateway.heartbeat.show_echo);
        assert_eq!(config.listen_address, DEFAULT_LISTEN_ADDR);
    }

    #[test]
    fn test_json_unknown_key_is_rejected() {
        assert!(RunnerConfig::from_json(r#"{ "franchise": "x" }"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            RunnerConfig::from_file("/nonexistent/franchise.json"),
            Err(GatewayError::Config(_))
        ));
    }
}
