//! Terminal chat client over a reconnecting WebSocket.
//!
//! On every (re)connect the client asks the endpoint for recent history,
//! renders each received message (`(You)` for its own posts), and posts each
//! typed line as a `sendMessage` command under a per-session username.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod render;
pub mod session;
pub mod socket;

pub use error::ChatError;
pub use protocol::{Command, Inbound, Message};
pub use session::{ChatSession, InputField};
pub use socket::{ReconnectingSocket, SocketConfig, SocketEvent, SocketHandle};
