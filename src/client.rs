//! Client loop: socket events, typed lines and Ctrl-C in one `select!`.

use std::io::BufRead;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ChatError;
use crate::identity::{FixedIdentity, IdentityProvider, RandomIdentity};
use crate::render::{RenderSink, TerminalSink};
use crate::session::{ChatSession, InputField};
use crate::socket::ReconnectingSocket;

/// Lines buffered between the stdin thread and the client loop.
pub const INPUT_CHANNEL_CAPACITY: usize = 16;

/// Fixed username from the config if set, otherwise a random one.
pub fn identity_for(config: &Config) -> Box<dyn IdentityProvider> {
    match &config.username {
        Some(name) => Box::new(FixedIdentity::new(name.clone())),
        None => Box::new(RandomIdentity::new(config.username_prefix.clone())),
    }
}

/// Chat on stdin/stdout until EOF, Ctrl-C, or the socket gives up.
pub async fn run(config: &Config, color: bool) -> Result<(), ChatError> {
    let sink = TerminalSink::new(std::io::stdout(), color)?;
    let input = spawn_stdin_reader()?;
    let identity = identity_for(config);
    run_with(config, identity.as_ref(), input, sink).await?;
    Ok(())
}

/// Read stdin on a detached OS thread and forward each line.
///
/// A read blocked on the terminal must not hold up runtime shutdown, so this
/// stays off tokio's blocking pool. The thread exits after EOF, a read error,
/// or once the receiver is gone.
pub fn spawn_stdin_reader() -> Result<mpsc::Receiver<std::io::Result<String>>, ChatError> {
    let (tx, rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Drive one session over `input` lines, rendering into `sink`.
///
/// Each input line becomes the input field's value and is posted. The input
/// ends when every sender is dropped. Returns the sink once the input ends or
/// Ctrl-C is received; messages already posted are flushed to the socket
/// before this returns.
pub async fn run_with<S>(
    config: &Config,
    identity: &dyn IdentityProvider,
    mut input: mpsc::Receiver<std::io::Result<String>>,
    sink: S,
) -> Result<S, ChatError>
where
    S: RenderSink,
{
    let mut socket = ReconnectingSocket::spawn(config.socket_config())?;
    let mut session = ChatSession::new(identity, sink, socket.handle());
    info!(endpoint = %config.endpoint, username = %session.username(), "connecting");

    let mut field = InputField::default();

    let result = loop {
        tokio::select! {
            event = socket.next_event() => match event {
                Some(event) => {
                    if let Err(e) = session.handle_event(event) {
                        break Err(e);
                    }
                }
                None => break Err(ChatError::SocketClosed),
            },

            line = input.recv() => match line {
                Some(Ok(line)) => {
                    field.set(line);
                    if let Err(e) = session.post_message(&mut field, &config.token) {
                        break Err(e);
                    }
                }
                Some(Err(e)) => break Err(ChatError::Io(e)),
                None => {
                    debug!("input closed");
                    break Ok(());
                }
            },

            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break Ok(());
            }
        }
    };

    socket.shutdown().await;
    result.map(|()| session.into_sink())
}
