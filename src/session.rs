//! Chat session: the username, the render sink and the socket handle a
//! client owns for its lifetime.

use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::identity::IdentityProvider;
use crate::protocol::{parse_inbound, Command};
use crate::render::{RenderSink, RenderedMessage};
use crate::socket::{SocketEvent, SocketHandle};

// ---------------------------------------------------------------------------
// Input field
// ---------------------------------------------------------------------------

/// Text the user is composing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputField {
    value: String,
}

impl InputField {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct ChatSession<S: RenderSink> {
    username: String,
    sink: S,
    socket: SocketHandle,
}

impl<S: RenderSink> ChatSession<S> {
    /// Draw a username from `identity` and bind it to `sink` and `socket`.
    pub fn new(identity: &dyn IdentityProvider, sink: S, socket: SocketHandle) -> Self {
        let username = identity.username();
        info!(username = %username, "session started");
        Self {
            username,
            sink,
            socket,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// The connection (re)opened: ask for recent history.
    pub fn handle_open(&mut self) -> Result<(), ChatError> {
        self.socket.send(Command::GetRecentMessages)
    }

    /// Render every message of an inbound frame, in order. Returns how many
    /// were appended.
    pub fn handle_text(&mut self, text: &str) -> Result<usize, ChatError> {
        let inbound = parse_inbound(text)?;
        for message in &inbound.messages {
            if self.sink.has_placeholder() {
                self.sink.clear()?;
            }
            self.sink
                .append(RenderedMessage::from_message(message, &self.username))?;
            self.sink.scroll_to_latest()?;
        }
        Ok(inbound.messages.len())
    }

    /// Send the input's content as `sendMessage`, then clear the input.
    ///
    /// Returns `Ok(false)` and leaves the input alone when it is empty. On
    /// error the input is left alone too.
    pub fn post_message(&mut self, input: &mut InputField, token: &str) -> Result<bool, ChatError> {
        if input.is_empty() {
            return Ok(false);
        }
        let command = Command::send_message(self.username.as_str(), token, input.value());
        self.socket.send(command)?;
        input.clear();
        Ok(true)
    }

    /// Dispatch one socket event.
    ///
    /// A malformed frame only aborts the handling of that frame: it is logged
    /// and `Ok` is returned so the caller keeps consuming events.
    pub fn handle_event(&mut self, event: SocketEvent) -> Result<(), ChatError> {
        match event {
            SocketEvent::Open => self.handle_open(),
            SocketEvent::Message(text) => match self.handle_text(&text) {
                Ok(count) => {
                    debug!(count, "rendered messages");
                    Ok(())
                }
                Err(ChatError::MalformedPayload(e)) => {
                    warn!(error = %e, "ignoring malformed payload");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            SocketEvent::Closed { reason } => {
                debug!(reason = %reason, "connection closed");
                Ok(())
            }
            SocketEvent::Reconnecting { attempt, delay } => {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
                Ok(())
            }
            SocketEvent::GaveUp { .. } => Err(ChatError::SocketClosed),
        }
    }
}
