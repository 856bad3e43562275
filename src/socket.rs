//! Reconnecting WebSocket client.
//!
//! ## Design
//! - One spawned task owns the WebSocket stream for its whole life
//! - Callers hold a cloneable [`SocketHandle`] (unbounded request channel)
//! - The task reports lifecycle and inbound frames on a bounded event channel
//! - Reconnect delay for attempt `n` is `interval * decay^n`, capped at the
//!   max interval; the counter resets after every successful open
//! - Commands issued while disconnected wait in a bounded FIFO queue and are
//!   flushed right after the next open
//!
//! The task stops when every handle is dropped, when [`SocketHandle::close`]
//! is called, or once `max_retries` retries after a failed connect have also
//! failed. Commands accepted before the close request are still delivered:
//! a pending connect is finished and the queue flushed before the close
//! frame goes out, and a disconnected socket makes one last connect attempt
//! when it still holds queued commands. Events are best effort; a dropped
//! event receiver never stops the task.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::error::ChatError;
use crate::protocol::Command;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(1_000);
pub const DEFAULT_RECONNECT_DECAY: f64 = 1.5;
pub const DEFAULT_MAX_RECONNECT_INTERVAL: Duration = Duration::from_millis(30_000);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(2_000);
pub const DEFAULT_MAX_QUEUED: usize = 100;

/// Capacity of the event channel between the socket task and its consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SocketConfig {
    /// `ws://` or `wss://` endpoint.
    pub url: String,
    /// Delay before the first reconnect attempt.
    pub reconnect_interval: Duration,
    /// Growth factor applied per consecutive failed attempt.
    pub reconnect_decay: f64,
    pub max_reconnect_interval: Duration,
    pub connect_timeout: Duration,
    /// Retries allowed after a failed connect before giving up, so the socket
    /// stops after `max_retries + 1` consecutive failures. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Commands held while disconnected; the oldest is dropped when full.
    pub max_queued: usize,
}

impl SocketConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            reconnect_decay: DEFAULT_RECONNECT_DECAY,
            max_reconnect_interval: DEFAULT_MAX_RECONNECT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_retries: None,
            max_queued: DEFAULT_MAX_QUEUED,
        }
    }

    /// Delay to wait before reconnect attempt `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.reconnect_interval.as_secs_f64();
        let max = self.max_reconnect_interval.as_secs_f64();
        let scaled = base * self.reconnect_decay.powi(attempt.min(64) as i32);
        Duration::from_secs_f64(scaled.min(max))
    }
}

/// Accept only `ws://` and `wss://` URLs that tungstenite can turn into a request.
pub fn validate_endpoint(url: &str) -> Result<(), ChatError> {
    let invalid = |reason: String| ChatError::InvalidEndpoint {
        url: url.to_string(),
        reason,
    };
    let rest = match url.split_once("://") {
        Some(("ws", rest)) | Some(("wss", rest)) => rest,
        _ => return Err(invalid("scheme must be ws or wss".to_string())),
    };
    if rest.split('/').next().unwrap_or("").is_empty() {
        return Err(invalid("missing host".to_string()));
    }
    url.into_client_request()
        .map(|_| ())
        .map_err(|e| invalid(e.to_string()))
}

// ---------------------------------------------------------------------------
// Events and handle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// A connection was (re)established.
    Open,
    /// A text frame arrived.
    Message(String),
    /// An open connection dropped.
    Closed { reason: String },
    /// Waiting `delay` before attempt number `attempt`.
    Reconnecting { attempt: u32, delay: Duration },
    /// Retries exhausted after `attempts` consecutive failed connects; the
    /// task has stopped.
    GaveUp { attempts: u32 },
}

/// What a [`SocketHandle`] asks of the socket task.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketRequest {
    Send(Command),
    Close,
}

/// Cloneable sending side of a socket.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    tx: mpsc::UnboundedSender<SocketRequest>,
}

impl SocketHandle {
    /// A handle plus the receiver a socket task would drain.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<SocketRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Hand `command` to the socket. Delivery happens now if the socket is
    /// open, otherwise after the next reconnect.
    pub fn send(&self, command: Command) -> Result<(), ChatError> {
        self.tx
            .send(SocketRequest::Send(command))
            .map_err(|_| ChatError::SocketClosed)
    }

    /// Ask the socket to close and stop reconnecting.
    pub fn close(&self) {
        let _ = self.tx.send(SocketRequest::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Reconnecting socket
// ---------------------------------------------------------------------------

pub struct ReconnectingSocket {
    handle: SocketHandle,
    events: mpsc::Receiver<SocketEvent>,
    task: JoinHandle<()>,
}

impl ReconnectingSocket {
    /// Validate the endpoint and spawn the socket task. The first connect
    /// attempt starts immediately.
    pub fn spawn(config: SocketConfig) -> Result<Self, ChatError> {
        validate_endpoint(&config.url)?;
        let (handle, requests) = SocketHandle::pair();
        let (event_tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let task = tokio::spawn(run(config, requests, event_tx));
        Ok(Self {
            handle,
            events,
            task,
        })
    }

    pub fn handle(&self) -> SocketHandle {
        self.handle.clone()
    }

    /// Next lifecycle event, or `None` once the task has stopped.
    pub async fn next_event(&mut self) -> Option<SocketEvent> {
        self.events.recv().await
    }

    /// Close the connection and wait for the task to finish. Commands sent
    /// before this call are flushed first.
    pub async fn shutdown(self) {
        self.handle.close();
        drop(self.events);
        let _ = self.task.await;
    }
}

enum Outcome {
    Disconnected(String),
    Shutdown,
}

async fn run(
    config: SocketConfig,
    mut requests: mpsc::UnboundedReceiver<SocketRequest>,
    events: mpsc::Sender<SocketEvent>,
) {
    let mut queue: VecDeque<Command> = VecDeque::new();
    // Reconnect attempts since the last open; indexes the backoff delay.
    let mut attempt: u32 = 0;
    // Connects that failed in a row.
    let mut failures: u32 = 0;
    let mut draining = false;

    loop {
        match connect(&config).await {
            Ok(ws) => {
                attempt = 0;
                failures = 0;
                info!(url = %config.url, "socket open");
                emit(&events, SocketEvent::Open).await;
                match drive(ws, &config, &mut requests, &events, &mut queue, draining).await {
                    Outcome::Shutdown => {
                        info!(url = %config.url, "socket shut down");
                        return;
                    }
                    Outcome::Disconnected(reason) => {
                        info!(url = %config.url, reason = %reason, "socket closed");
                        emit(&events, SocketEvent::Closed { reason }).await;
                    }
                }
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                warn!(url = %config.url, attempt, failures, error = %e, "connect failed");
            }
        }

        if draining {
            if !queue.is_empty() {
                warn!(dropped = queue.len(), "socket closing, dropping undelivered commands");
            }
            return;
        }

        if let Some(max) = config.max_retries {
            if failures > max {
                error!(url = %config.url, attempts = failures, "giving up on reconnect");
                emit(&events, SocketEvent::GaveUp { attempts: failures }).await;
                return;
            }
        }

        let delay = config.delay_for_attempt(attempt);
        attempt = attempt.saturating_add(1);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        emit(&events, SocketEvent::Reconnecting { attempt, delay }).await;
        match wait_queueing(delay, &mut requests, &mut queue, config.max_queued).await {
            Wake::Retry => {}
            Wake::Drain => {
                debug!(queued = queue.len(), "close requested, connecting once more to flush");
                draining = true;
            }
            Wake::Stop => return,
        }
    }
}

/// Report `event` if anyone is still listening. The consumer drops its
/// receiver while shutting down, and accepted commands must still go out.
async fn emit(events: &mpsc::Sender<SocketEvent>, event: SocketEvent) {
    let _ = events.send(event).await;
}

async fn connect(config: &SocketConfig) -> Result<WsStream, ChatError> {
    match tokio::time::timeout(config.connect_timeout, connect_async(config.url.as_str())).await {
        Ok(Ok((ws, _response))) => Ok(ws),
        Ok(Err(e)) => Err(ChatError::WebSocket(e)),
        Err(_) => Err(ChatError::ConnectTimeout(config.connect_timeout)),
    }
}

/// Pump one open connection until it drops or the socket is shut down.
///
/// With `draining` set the close request was already consumed, so the queue
/// is flushed and the connection closed right away.
async fn drive(
    ws: WsStream,
    config: &SocketConfig,
    requests: &mut mpsc::UnboundedReceiver<SocketRequest>,
    events: &mpsc::Sender<SocketEvent>,
    queue: &mut VecDeque<Command>,
    draining: bool,
) -> Outcome {
    let (mut sink, mut stream) = ws.split();

    if let Err(reason) = flush_queue(&mut sink, queue).await {
        return Outcome::Disconnected(reason);
    }
    if draining {
        let _ = sink.close().await;
        return Outcome::Shutdown;
    }

    loop {
        tokio::select! {
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            debug!("dropping non-utf8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(WsMessage::Close(frame))) => {
                        let reason = frame
                            .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                            .unwrap_or_else(|| "closed by peer".to_string());
                        return Outcome::Disconnected(reason);
                    }
                    // Ping/pong are answered by tungstenite.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Outcome::Disconnected(e.to_string()),
                    None => return Outcome::Disconnected("stream ended".to_string()),
                };
                debug!(bytes = text.len(), "frame received");
                emit(events, SocketEvent::Message(text)).await;
            }

            request = requests.recv() => {
                match request {
                    Some(SocketRequest::Send(command)) => {
                        debug!(action = command.action(), url = %config.url, "sending command");
                        if let Err(reason) = send_or_requeue(&mut sink, command, queue).await {
                            return Outcome::Disconnected(reason);
                        }
                    }
                    Some(SocketRequest::Close) | None => {
                        let _ = sink.close().await;
                        return Outcome::Shutdown;
                    }
                }
            }
        }
    }
}

/// Write queued commands oldest first. On a failed write the command goes
/// back to the front of the queue and the error text is returned.
async fn flush_queue<S>(sink: &mut S, queue: &mut VecDeque<Command>) -> Result<(), String>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    if !queue.is_empty() {
        debug!(queued = queue.len(), "flushing queued commands");
    }
    while let Some(command) = queue.pop_front() {
        send_or_requeue(sink, command, queue).await?;
    }
    Ok(())
}

/// Write one command; on failure it is pushed back to the front of `queue`.
async fn send_or_requeue<S>(
    sink: &mut S,
    command: Command,
    queue: &mut VecDeque<Command>,
) -> Result<(), String>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    let Some(text) = encode_or_log(&command) else {
        return Ok(());
    };
    if let Err(e) = sink.send(WsMessage::Text(text)).await {
        warn!(action = command.action(), error = %e, "write failed, requeueing command");
        queue.push_front(command);
        return Err(e.to_string());
    }
    Ok(())
}

/// What ended a reconnect delay.
#[derive(Debug, PartialEq, Eq)]
enum Wake {
    /// The delay elapsed; connect again.
    Retry,
    /// Close was requested with commands still queued; connect once more to
    /// deliver them, then stop.
    Drain,
    Stop,
}

/// Sleep for `delay` while queueing any commands that arrive.
async fn wait_queueing(
    delay: Duration,
    requests: &mut mpsc::UnboundedReceiver<SocketRequest>,
    queue: &mut VecDeque<Command>,
    max_queued: usize,
) -> Wake {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return Wake::Retry,
            request = requests.recv() => match request {
                Some(SocketRequest::Send(command)) => enqueue(queue, command, max_queued),
                Some(SocketRequest::Close) | None if queue.is_empty() => return Wake::Stop,
                Some(SocketRequest::Close) | None => return Wake::Drain,
            },
        }
    }
}

/// Push `command`, evicting the oldest entry when the queue is full.
pub(crate) fn enqueue(queue: &mut VecDeque<Command>, command: Command, max_queued: usize) {
    if max_queued == 0 {
        warn!(action = command.action(), "socket not open, dropping command");
        return;
    }
    if queue.len() >= max_queued {
        if let Some(dropped) = queue.pop_front() {
            warn!(action = dropped.action(), max_queued, "send queue full, dropping oldest command");
        }
    }
    queue.push_back(command);
}

fn encode_or_log(command: &Command) -> Option<String> {
    match command.encode() {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(action = command.action(), error = %e, "dropping unencodable command");
            None
        }
    }
}
