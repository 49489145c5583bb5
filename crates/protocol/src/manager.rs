//! Conversation correlation and command dispatch.
//!
//! [`ConnectionManager`] is transport-agnostic. A [`Connection`] is an id
//! plus the sending half of an unbounded channel of [`Envelope`]s. The
//! task that owns the socket drains the receiving half and writes text
//! frames, and reads inbound frames into
//! [`ConnectionManager::on_message_received`].
//!
//! Locks guard only map lookups and are never held across an `.await`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::envelope::{new_conversation_id, Envelope, Request};

/// Default reply timeout for [`ConnectionManager::send_and_wait`].
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Channel sender half for pushing envelopes to a connection.
pub type OutboundSender = mpsc::UnboundedSender<Envelope>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The socket task behind the connection has gone away.
    #[error("Connection {0} is closed")]
    ConnectionClosed(String),

    /// A request with this conversation id is already awaiting its reply.
    #[error("Conversation {0} already has a pending command")]
    DuplicateConversation(String),
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Handle to one logical bidirectional connection.
#[derive(Debug, Clone)]
pub struct Connection {
    id: String,
    sender: OutboundSender,
}

impl Connection {
    pub fn new(id: impl Into<String>, sender: OutboundSender) -> Self {
        Self {
            id: id.into(),
            sender,
        }
    }

    /// Create a connection together with the receiver its socket task drains.
    pub fn channel(id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn send(&self, envelope: Envelope) -> Result<(), ProtocolError> {
        self.sender
            .send(envelope)
            .map_err(|_| ProtocolError::ConnectionClosed(self.id.clone()))
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Outcome of [`ConnectionManager::send_and_wait`].
///
/// A timeout is a valid outcome, not an error: callers branch on it.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Reply(Envelope),
    Timeout,
}

impl Response {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    pub fn into_reply(self) -> Option<Envelope> {
        match self {
            Self::Reply(envelope) => Some(envelope),
            Self::Timeout => None,
        }
    }
}

/// What the demultiplexer did with one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A pending request was resolved with this frame.
    Resolved,
    /// The frame matched a pending request whose deadline had passed.
    Late,
    /// The conversation id belongs to a request sent on another
    /// connection: dropped, and that request keeps waiting.
    Misdirected,
    /// A registered handler ran; `replied` is whether it sent a reply.
    Handled { command: String, replied: bool },
    /// No pending request and no handler: dropped.
    Unknown,
    /// The frame was not a valid envelope: dropped.
    Malformed,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Handler for one unsolicited command.
///
/// Returning `Some(value)` sends `value` back as the reply `msg` under the
/// request's conversation id. Returning `None` sends nothing.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, envelope: Envelope) -> Option<Value>;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(Envelope) -> Fut + Send + Sync,
    Fut: Future<Output = Option<Value>> + Send,
{
    async fn handle(&self, envelope: Envelope) -> Option<Value> {
        (self)(envelope).await
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

struct PendingCommand {
    /// Id of the connection the request went out on.
    conn_id: String,
    slot: oneshot::Sender<Envelope>,
    deadline: Instant,
}

type PendingMap = Mutex<HashMap<String, PendingCommand>>;

/// Removes a pending entry when the waiting future finishes or is dropped.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    conversation_id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.conversation_id);
    }
}

/// Request/reply correlation plus a command dispatch table.
///
/// Designed to be wrapped in `Arc` and shared by every task that sends on
/// or reads from the connections it serves.
pub struct ConnectionManager {
    pending: PendingMap,
    handlers: RwLock<HashMap<String, Arc<dyn CommandHandler>>>,
    default_timeout: Duration,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::with_default_timeout(DEFAULT_COMMAND_TIMEOUT)
    }

    pub fn with_default_timeout(default_timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Register (or replace) the handler for `command`.
    pub fn register_handler<H>(&self, command: impl Into<String>, handler: H)
    where
        H: CommandHandler + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(command.into(), Arc::new(handler));
    }

    pub fn has_handler(&self, command: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(command)
    }

    /// Number of requests currently awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Transmit without awaiting a reply. Returns the conversation id used.
    pub fn send_fire_and_forget(
        &self,
        conn: &Connection,
        request: impl Into<Request>,
        conversation_id: Option<String>,
    ) -> Result<String, ProtocolError> {
        let conversation_id = conversation_id.unwrap_or_else(new_conversation_id);
        conn.send(request.into().into_envelope(conversation_id.clone()))?;
        tracing::trace!(conn_id = %conn.id(), conversation_id = %conversation_id, "Sent fire-and-forget");
        Ok(conversation_id)
    }

    /// Transmit and suspend until the matching reply or the timeout.
    ///
    /// `timeout` falls back to the manager's default. The pending entry is
    /// removed on every path, including when this future is dropped.
    pub async fn send_and_wait(
        &self,
        conn: &Connection,
        request: impl Into<Request>,
        conversation_id: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Response, ProtocolError> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let conversation_id = conversation_id.unwrap_or_else(new_conversation_id);
        let (slot, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending.contains_key(&conversation_id) {
                return Err(ProtocolError::DuplicateConversation(conversation_id));
            }
            pending.insert(
                conversation_id.clone(),
                PendingCommand {
                    conn_id: conn.id().to_string(),
                    slot,
                    deadline: Instant::now() + timeout,
                },
            );
        }
        let _guard = PendingGuard {
            pending: &self.pending,
            conversation_id: conversation_id.clone(),
        };

        conn.send(request.into().into_envelope(conversation_id.clone()))?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(Response::Reply(reply)),
            Ok(Err(_)) | Err(_) => {
                tracing::debug!(
                    conn_id = %conn.id(),
                    conversation_id = %conversation_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Command timed out",
                );
                Ok(Response::Timeout)
            }
        }
    }

    /// Demultiplex one inbound text frame received on `conn`.
    pub async fn on_message_received(&self, conn: &Connection, data: &str) -> Inbound {
        match Envelope::parse(data) {
            Ok(envelope) => self.on_envelope(conn, envelope).await,
            Err(e) => {
                tracing::warn!(conn_id = %conn.id(), error = %e, raw = %data, "Malformed envelope dropped");
                Inbound::Malformed
            }
        }
    }

    /// Demultiplex one already-parsed envelope.
    pub async fn on_envelope(&self, conn: &Connection, envelope: Envelope) -> Inbound {
        let envelope = match self.resolve(conn, envelope) {
            Ok(outcome) => return outcome,
            Err(unsolicited) => unsolicited,
        };

        let Some(command) = envelope.command().map(str::to_string) else {
            tracing::warn!(
                conn_id = %conn.id(),
                conversation_id = %envelope.conversation_id,
                "Unsolicited message without a command name dropped",
            );
            return Inbound::Unknown;
        };

        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&command)
            .cloned();
        let Some(handler) = handler else {
            tracing::warn!(conn_id = %conn.id(), command = %command, "Unknown command dropped");
            return Inbound::Unknown;
        };

        let conversation_id = envelope.conversation_id.clone();
        let replied = match handler.handle(envelope).await {
            Some(reply) => match conn.send(Envelope::new(conversation_id, reply)) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(conn_id = %conn.id(), command = %command, error = %e, "Failed to send reply");
                    false
                }
            },
            None => false,
        };

        Inbound::Handled { command, replied }
    }

    /// Hand `envelope` to its pending request, or give it back.
    ///
    /// Only a reply arriving on the request's own connection resolves it.
    fn resolve(&self, conn: &Connection, envelope: Envelope) -> Result<Inbound, Envelope> {
        let entry = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let expected = match pending.get(&envelope.conversation_id) {
                None => return Err(envelope),
                Some(p) => p.conn_id.clone(),
            };
            if expected != conn.id() {
                tracing::warn!(
                    conn_id = %conn.id(),
                    expected_conn_id = %expected,
                    conversation_id = %envelope.conversation_id,
                    "Reply from the wrong connection dropped",
                );
                return Ok(Inbound::Misdirected);
            }
            pending.remove(&envelope.conversation_id)
        };

        let Some(pending) = entry else {
            return Err(envelope);
        };

        if Instant::now() > pending.deadline {
            tracing::debug!(conversation_id = %envelope.conversation_id, "Reply arrived after deadline");
            return Ok(Inbound::Late);
        }

        match pending.slot.send(envelope) {
            Ok(()) => Ok(Inbound::Resolved),
            Err(_) => Ok(Inbound::Late),
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
