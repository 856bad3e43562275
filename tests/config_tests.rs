//! Tests for loading and resolving the client configuration.

use std::io::Write;
use std::time::Duration;

use clap::Parser;

use relay_chat::cli::Args;
use relay_chat::config::{Config, DEFAULT_ENDPOINT};
use relay_chat::ChatError;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_file() {
    let file = write_config(
        r#"
        endpoint = "ws://127.0.0.1:9001/chat"
        token = "abc"
        username_prefix = "guest-"

        [reconnect]
        interval_ms = 500
        decay = 2.0
        max_interval_ms = 8000
        connect_timeout_ms = 1500
        max_retries = 10
        max_queued = 5
        "#,
    );
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.endpoint, "ws://127.0.0.1:9001/chat");
    assert_eq!(config.token, "abc");
    assert_eq!(config.username_prefix, "guest-");
    assert!(config.validate().is_ok());

    let socket = config.socket_config();
    assert_eq!(socket.reconnect_interval, Duration::from_millis(500));
    assert_eq!(socket.delay_for_attempt(3), Duration::from_millis(4000));
    assert_eq!(socket.delay_for_attempt(5), Duration::from_millis(8000));
    assert_eq!(socket.connect_timeout, Duration::from_millis(1500));
    assert_eq!(socket.max_retries, Some(10));
    assert_eq!(socket.max_queued, 5);
}

#[test]
fn test_load_empty_file_gives_defaults() {
    let file = write_config("");
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    match Config::load(&path) {
        Err(ChatError::Config { path: p, .. }) => assert!(p.ends_with("absent.toml")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
fn test_load_bad_toml_reports_path() {
    let file = write_config("[reconnect\ninterval_ms = 1");
    match Config::load(file.path()) {
        Err(ChatError::Config { path, .. }) => {
            assert_eq!(path, file.path().display().to_string())
        }
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
fn test_load_wrong_type_is_error() {
    let file = write_config("[reconnect]\nmax_retries = \"many\"");
    assert!(Config::load(file.path()).is_err());
}

#[test]
fn test_resolve_without_file_uses_defaults_and_flags() {
    let args = Args::parse_from(["relay-chat", "--username", "client-4821"]);
    let config = Config::resolve(&args).unwrap();
    assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    assert_eq!(config.username.as_deref(), Some("client-4821"));
}

#[test]
fn test_resolve_flag_beats_file() {
    let file = write_config(r#"endpoint = "ws://file.example/chat""#);
    let path = file.path().to_str().unwrap().to_string();
    let args = Args::parse_from([
        "relay-chat",
        "--config",
        path.as_str(),
        "--endpoint",
        "wss://flag.example/chat",
    ]);
    let config = Config::resolve(&args).unwrap();
    assert_eq!(config.endpoint, "wss://flag.example/chat");
}

#[test]
fn test_resolve_rejects_invalid_endpoint_from_file() {
    let file = write_config(r#"endpoint = "http://example.com""#);
    let path = file.path().to_str().unwrap().to_string();
    let args = Args::parse_from(["relay-chat", "--config", path.as_str()]);
    assert!(matches!(
        Config::resolve(&args),
        Err(ChatError::InvalidEndpoint { .. })
    ));
}

#[test]
fn test_resolve_rejects_empty_username_flag() {
    let args = Args::parse_from(["relay-chat", "--username", ""]);
    assert!(matches!(
        Config::resolve(&args),
        Err(ChatError::Config { .. })
    ));
}

#[test]
fn test_resolve_rejects_zero_connect_timeout_from_file() {
    let file = write_config("[reconnect]\nconnect_timeout_ms = 0\n");
    let path = file.path().to_str().unwrap().to_string();
    let args = Args::parse_from(["relay-chat", "--config", path.as_str()]);
    assert!(matches!(
        Config::resolve(&args),
        Err(ChatError::Config { .. })
    ));
}

#[test]
fn test_resolve_rejects_nan_decay_from_file() {
    let file = write_config("[reconnect]\ndecay = nan\n");
    let path = file.path().to_str().unwrap().to_string();
    let args = Args::parse_from(["relay-chat", "--config", path.as_str()]);
    assert!(matches!(
        Config::resolve(&args),
        Err(ChatError::Config { .. })
    ));
}
