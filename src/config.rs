//! Client configuration: TOML file plus CLI overrides.
//!
//! Precedence is CLI flag, then config file, then built-in default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::error::ChatError;
use crate::identity::DEFAULT_USERNAME_PREFIX;
use crate::socket::{self, validate_endpoint, SocketConfig};

pub const DEFAULT_ENDPOINT: &str = "wss://j3g9c0fuye.execute-api.us-east-1.amazonaws.com/dev";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    /// Opaque authorization token attached to every `sendMessage`.
    pub token: String,
    pub username_prefix: String,
    /// Fixed username; when unset a random one is generated.
    pub username: Option<String>,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub interval_ms: u64,
    pub decay: f64,
    pub max_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_retries: Option<u32>,
    pub max_queued: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: String::new(),
            username_prefix: DEFAULT_USERNAME_PREFIX.to_string(),
            username: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            interval_ms: socket::DEFAULT_RECONNECT_INTERVAL.as_millis() as u64,
            decay: socket::DEFAULT_RECONNECT_DECAY,
            max_interval_ms: socket::DEFAULT_MAX_RECONNECT_INTERVAL.as_millis() as u64,
            connect_timeout_ms: socket::DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            max_retries: None,
            max_queued: socket::DEFAULT_MAX_QUEUED,
        }
    }
}

impl Config {
    /// Read and parse a TOML config file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ChatError::Config {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ChatError::Config { detail, .. } => ChatError::Config {
                path: path.display().to_string(),
                detail,
            },
            other => other,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ChatError> {
        toml::from_str(contents).map_err(|e| ChatError::Config {
            path: "<inline>".to_string(),
            detail: e.to_string(),
        })
    }

    /// Build the effective config: file (if given) overlaid with CLI flags.
    pub fn resolve(args: &Args) -> Result<Self, ChatError> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(endpoint) = &args.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(token) = &args.token {
            self.token = token.clone();
        }
        if let Some(prefix) = &args.username_prefix {
            self.username_prefix = prefix.clone();
        }
        if let Some(username) = &args.username {
            self.username = Some(username.clone());
        }
        if let Some(max_retries) = args.max_retries {
            self.reconnect.max_retries = Some(max_retries);
        }
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        validate_endpoint(&self.endpoint)?;
        let bad = |detail: &str| ChatError::Config {
            path: "<resolved>".to_string(),
            detail: detail.to_string(),
        };
        if self.username_prefix.is_empty() {
            return Err(bad("username_prefix must not be empty"));
        }
        if matches!(&self.username, Some(name) if name.is_empty()) {
            return Err(bad("username must not be empty"));
        }
        if self.reconnect.decay.is_nan() || self.reconnect.decay < 1.0 {
            return Err(bad("reconnect.decay must be at least 1.0"));
        }
        if self.reconnect.connect_timeout_ms == 0 {
            return Err(bad("reconnect.connect_timeout_ms must be greater than 0"));
        }
        if self.reconnect.max_interval_ms < self.reconnect.interval_ms {
            return Err(bad("reconnect.max_interval_ms must be >= reconnect.interval_ms"));
        }
        Ok(())
    }

    pub fn socket_config(&self) -> SocketConfig {
        SocketConfig {
            url: self.endpoint.clone(),
            reconnect_interval: Duration::from_millis(self.reconnect.interval_ms),
            reconnect_decay: self.reconnect.decay,
            max_reconnect_interval: Duration::from_millis(self.reconnect.max_interval_ms),
            connect_timeout: Duration::from_millis(self.reconnect.connect_timeout_ms),
            max_retries: self.reconnect.max_retries,
            max_queued: self.reconnect.max_queued,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(c.token, "");
        assert_eq!(c.username_prefix, "client-");
        assert!(c.validate().is_ok());
        assert_eq!(c.socket_config(), SocketConfig::new(DEFAULT_ENDPOINT));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let c = Config::from_toml_str(
            r#"
            token = "abc"

            [reconnect]
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(c.token, "abc");
        assert_eq!(c.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(c.reconnect.max_retries, Some(5));
        assert_eq!(c.reconnect.interval_ms, 1_000);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml_str("endpoint = ").unwrap_err();
        assert!(matches!(err, ChatError::Config { .. }));
    }

    #[rstest]
    #[case(0.5)]
    #[case(0.0)]
    #[case(f64::NAN)]
    #[case(f64::NEG_INFINITY)]
    fn test_validate_rejects_bad_decay(#[case] decay: f64) {
        let mut c = Config::default();
        c.reconnect.decay = decay;
        assert!(matches!(c.validate(), Err(ChatError::Config { .. })));
    }

    #[test]
    fn test_validate_accepts_unit_decay() {
        let mut c = Config::default();
        c.reconnect.decay = 1.0;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_connect_timeout() {
        let mut c = Config::default();
        c.reconnect.connect_timeout_ms = 0;
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("connect_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_empty_prefix() {
        let mut c = Config::default();
        c.username_prefix.clear();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_http_endpoint() {
        let mut c = Config::default();
        c.endpoint = "http://localhost".into();
        assert!(matches!(
            c.validate(),
            Err(ChatError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let mut c = Config::from_toml_str(r#"token = "from-file""#).unwrap();
        let args = Args::parse_from([
            "relay-chat",
            "--token",
            "from-cli",
            "--endpoint",
            "ws://localhost:9000",
            "--max-retries",
            "3",
        ]);
        c.apply_args(&args);
        assert_eq!(c.token, "from-cli");
        assert_eq!(c.endpoint, "ws://localhost:9000");
        assert_eq!(c.reconnect.max_retries, Some(3));
    }

    #[test]
    fn test_socket_config_conversion() {
        let mut c = Config::default();
        c.reconnect.interval_ms = 250;
        c.reconnect.connect_timeout_ms = 100;
        let s = c.socket_config();
        assert_eq!(s.reconnect_interval, Duration::from_millis(250));
        assert_eq!(s.connect_timeout, Duration::from_millis(100));
    }
}
