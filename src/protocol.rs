//! Wire types for the chat endpoint.
//!
//! Outbound frames are command envelopes tagged on `action`; inbound frames
//! carry a batch of messages:
//!
//! ```text
//! -> {"action":"getRecentMessages"}
//! -> {"action":"sendMessage","username":"client-4821","token":"abc","content":"hello"}
//! <- {"messages":[{"username":"client-4821","content":"hello"}]}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// A single chat message as delivered by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub username: String,
    pub content: String,
}

/// A command envelope sent to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    /// Ask the endpoint to replay its recent history.
    GetRecentMessages,
    /// Post `content` as `username`, authorized by an opaque `token`.
    SendMessage {
        username: String,
        token: String,
        content: String,
    },
}

impl Command {
    pub fn send_message(
        username: impl Into<String>,
        token: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Command::SendMessage {
            username: username.into(),
            token: token.into(),
            content: content.into(),
        }
    }

    /// The `action` tag this command serializes with.
    pub fn action(&self) -> &'static str {
        match self {
            Command::GetRecentMessages => "getRecentMessages",
            Command::SendMessage { .. } => "sendMessage",
        }
    }

    /// Serialize to the JSON text frame sent on the wire.
    pub fn encode(&self) -> Result<String, ChatError> {
        serde_json::to_string(self).map_err(ChatError::Encode)
    }
}

/// An inbound frame: an ordered batch of messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbound {
    pub messages: Vec<Message>,
}

/// Parse an inbound text frame. The `messages` field is required.
pub fn parse_inbound(text: &str) -> Result<Inbound, ChatError> {
    serde_json::from_str(text).map_err(ChatError::MalformedPayload)
}
