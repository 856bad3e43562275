//! Crate-level error type.

use thiserror::Error;

/// Everything that can go wrong between the terminal and the socket.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Inbound frame was not a `{"messages": [...]}` payload.
    #[error("malformed inbound payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    /// Outbound command could not be serialized.
    #[error("failed to encode command: {0}")]
    Encode(#[source] serde_json::Error),

    /// The socket task has shut down and no longer accepts commands.
    #[error("socket is closed")]
    SocketClosed,

    /// A connect attempt did not finish within the configured timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// Endpoint is not a usable `ws://` or `wss://` URL.
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("config error in {path}: {detail}")]
    Config { path: String, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
