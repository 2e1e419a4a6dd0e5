//! Session Management
//!
//! A [`SessionTransport`] is the live, stateful end of one logical MCP
//! session. The [`SessionRegistry`] is the only owner of transports and the
//! only place the `session id -> transport` mapping is mutated.
//!
//! Lifecycle events are emitted as tracing events with a `session_id` field:
//! - `Session initialized` - handshake completed, hook fired
//! - `Standalone stream attached` - GET stream opened
//! - `Session closed` - close hook fired (with `reason`)

mod registry;

pub use registry::{spawn_reaper, SessionRegistry};

use axum::response::sse::Event;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::server::McpServer;
use crate::transport::TransportError;
use crate::types::jsonrpc::{reply_to, JsonRpcMessage};

/// Sender half of a standalone SSE stream.
pub type StreamSender = mpsc::Sender<Result<Event, axum::Error>>;

/// Receiver half handed to the HTTP layer.
pub type StreamReceiver = mpsc::Receiver<Result<Event, axum::Error>>;

type InitializedHook = Box<dyn FnOnce(Arc<SessionTransport>) + Send>;
type CloseHook = Box<dyn FnOnce(&str) + Send>;

/// What the HTTP layer should send back for a POSTed message.
#[derive(Debug, Clone, PartialEq)]
pub enum PostOutcome {
    /// Notification consumed; reply 202 with no body.
    Accepted,
    /// JSON-RPC response envelope.
    Reply(Value),
}

/// One session's transport: a server instance plus connection state.
pub struct SessionTransport {
    session_id: String,
    server: McpServer,
    created_at: Instant,
    initialized: AtomicBool,
    closed: AtomicBool,
    last_seen: Mutex<Instant>,
    stream: Mutex<Option<StreamSender>>,
    on_initialized: Mutex<Option<InitializedHook>>,
    on_close: Mutex<Option<CloseHook>>,
}

impl SessionTransport {
    /// Create a transport around a freshly constructed server, with a new
    /// random session id. The id is not visible to clients until the
    /// transport initializes.
    pub fn new(server: McpServer) -> Arc<Self> {
        let now = Instant::now();
        Arc::new(Self {
            session_id: Uuid::new_v4().to_string(),
            server,
            created_at: now,
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            last_seen: Mutex::new(now),
            stream: Mutex::new(None),
            on_initialized: Mutex::new(None),
            on_close: Mutex::new(None),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn server(&self) -> &McpServer {
        &self.server
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether a standalone stream is attached and still open.
    pub fn has_stream(&self) -> bool {
        lock(&self.stream)
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn idle_duration(&self) -> Duration {
        lock(&self.last_seen).elapsed()
    }

    pub fn touch(&self) {
        *lock(&self.last_seen) = Instant::now();
    }

    /// Register the hook fired once, synchronously, when `initialize` succeeds.
    pub fn on_initialized(&self, hook: impl FnOnce(Arc<SessionTransport>) + Send + 'static) {
        *lock(&self.on_initialized) = Some(Box::new(hook));
    }

    /// Register the hook fired exactly once when the transport closes.
    pub fn on_close(&self, hook: impl FnOnce(&str) + Send + 'static) {
        *lock(&self.on_close) = Some(Box::new(hook));
    }

    /// Process one POSTed JSON-RPC message.
    ///
    /// Only `initialize` is accepted before the handshake. The initialized
    /// hook runs between the handshake succeeding and this future resolving,
    /// with no await in between.
    pub async fn handle_post(self: &Arc<Self>, message: JsonRpcMessage) -> Result<PostOutcome, TransportError> {
        if self.is_closed() {
            return Err(TransportError::SessionClosed);
        }
        self.touch();

        if message.is_initialize() {
            if self.is_initialized() {
                return Err(TransportError::AlreadyInitialized);
            }

            let result = self.server.handle(&self.session_id, &message).await;
            if result.is_ok() && !self.initialized.swap(true, Ordering::SeqCst) {
                tracing::info!(session_id = %self.session_id, "Session initialized");
                let hook = lock(&self.on_initialized).take();
                if let Some(hook) = hook {
                    hook(Arc::clone(self));
                }
            }
            return Ok(PostOutcome::Reply(reply_to(&message, result)));
        }

        if !self.is_initialized() {
            return Err(TransportError::NotInitialized);
        }

        let result = self.server.handle(&self.session_id, &message).await;
        if message.is_notification() {
            Ok(PostOutcome::Accepted)
        } else {
            Ok(PostOutcome::Reply(reply_to(&message, result)))
        }
    }

    /// Open the session's standalone server-to-client stream.
    ///
    /// At most one may be open at a time. The stream ends when the transport
    /// closes.
    pub fn attach_stream(&self) -> Result<StreamReceiver, TransportError> {
        if self.is_closed() {
            return Err(TransportError::SessionClosed);
        }

        let mut slot = lock(&self.stream);
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(TransportError::StreamConflict);
        }

        let (tx, rx) = mpsc::channel(32);
        *slot = Some(tx);
        drop(slot);

        self.touch();
        tracing::info!(session_id = %self.session_id, "Standalone stream attached");
        Ok(rx)
    }

    /// Close the transport. Idempotent; the close hook fires on the first
    /// call only. Dropping the stream sender ends any attached SSE response.
    pub fn close(&self, reason: &str) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        lock(&self.stream).take();
        let hook = lock(&self.on_close).take();
        if let Some(hook) = hook {
            hook(&self.session_id);
        }

        tracing::info!(
            session_id = %self.session_id,
            reason = %reason,
            age_secs = self.age().as_secs(),
            "Session closed"
        );
    }
}

impl std::fmt::Debug for SessionTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTransport")
            .field("session_id", &self.session_id)
            .field("initialized", &self.is_initialized())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Lock ignoring poison; the guarded values stay consistent across panics.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
