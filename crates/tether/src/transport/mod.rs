//! MCP Transports
//!
//! ## Streamable HTTP
//! - `POST /` - JSON-RPC message; initiates a session when the
//!   `mcp-session-id` header is absent or unknown
//! - `GET /` - standalone SSE stream for an existing session
//! - `DELETE /` - terminate a session
//!
//! ## Stdio
//! Newline-delimited JSON-RPC, one session per process. See [`stdio`].

mod error;
mod streamable;
pub mod stdio;

pub use error::TransportError;
pub use streamable::{delete_handler, get_handler, post_handler};

use axum::Router;
use std::sync::Arc;

use crate::server::{Handler, McpServer};
use crate::session::{SessionRegistry, SessionTransport};

/// Header carrying the session id in both directions.
pub const SESSION_HEADER: &str = "mcp-session-id";

type ServerFactory = Arc<dyn Fn() -> McpServer + Send + Sync>;
type SessionClosedCallback = Arc<dyn Fn(&str) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Maps session ids to live transports for the streamable HTTP transport.
///
/// All registry mutation goes through the transports' hooks or
/// [`SessionManager::terminate`].
pub struct SessionManager {
    registry: Arc<SessionRegistry>,
    server_factory: ServerFactory,
    on_session_closed: Option<SessionClosedCallback>,
    on_error: Option<ErrorCallback>,
}

impl SessionManager {
    /// Manager whose sessions each get a fresh [`McpServer`] over `handler`.
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self::with_factory(move || McpServer::new(Arc::clone(&handler)))
    }

    pub fn with_factory(factory: impl Fn() -> McpServer + Send + Sync + 'static) -> Self {
        Self {
            registry: SessionRegistry::new_shared(),
            server_factory: Arc::new(factory),
            on_session_closed: None,
            on_error: None,
        }
    }

    /// Callback fired once per session when its transport closes.
    pub fn with_session_closed(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_session_closed = Some(Arc::new(callback));
        self
    }

    /// Callback for unexpected failures while handling a request.
    pub fn with_error_handler(mut self, callback: impl Fn(&TransportError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Build a transport for a new session.
    ///
    /// The transport registers itself when `initialize` succeeds and
    /// unregisters when it closes; a failed handshake leaves no entry.
    pub fn initiate(&self) -> Arc<SessionTransport> {
        let transport = SessionTransport::new((self.server_factory)());

        let registry = Arc::downgrade(&self.registry);
        transport.on_initialized(move |transport| {
            if let Some(registry) = registry.upgrade() {
                let session_id = transport.session_id().to_string();
                registry.set(session_id, transport);
            }
        });

        let registry = Arc::downgrade(&self.registry);
        let callback = self.on_session_closed.clone();
        transport.on_close(move |session_id| {
            if let Some(registry) = registry.upgrade() {
                registry.delete(session_id);
            }
            if let Some(callback) = callback {
                callback(session_id);
            }
        });

        transport
    }

    /// Transport for a POST: the registered one for a known id, otherwise a
    /// new one.
    pub fn transport_for_post(&self, session_id: Option<&str>) -> Arc<SessionTransport> {
        match session_id.and_then(|id| self.registry.get(id)) {
            Some(transport) => transport,
            None => {
                if let Some(id) = session_id {
                    tracing::debug!(session_id = %id, "Unknown session id, initiating a new session");
                }
                self.initiate()
            }
        }
    }

    /// Transport for a GET stream. Never creates a session.
    pub fn transport_for_stream(&self, session_id: Option<&str>) -> Result<Arc<SessionTransport>, TransportError> {
        let session_id = session_id.ok_or(TransportError::MissingSessionId)?;
        self.registry
            .get(session_id)
            .ok_or_else(|| TransportError::UnknownSession(session_id.to_string()))
    }

    /// Close and remove a session. `Ok(false)` for an unknown id.
    pub fn terminate(&self, session_id: Option<&str>) -> Result<bool, TransportError> {
        let session_id = session_id.ok_or(TransportError::MissingSessionId)?;
        match self.registry.get(session_id) {
            Some(transport) => {
                transport.close("terminated");
                self.registry.delete(session_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn report_error(&self, error: &TransportError) {
        tracing::error!(error = %error, "Error handling MCP request");
        if let Some(ref callback) = self.on_error {
            callback(error);
        }
    }
}

/// Build the streamable HTTP router. Mount it wherever the MCP endpoint
/// should live, e.g. `Router::new().nest("/mcp", router(manager))`.
pub fn router(manager: Arc<SessionManager>) -> Router {
    Router::new()
        .route(
            "/",
            axum::routing::post(post_handler)
                .get(get_handler)
                .delete(delete_handler),
        )
        .with_state(manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::tests::{initialize_message, EchoHandler};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(EchoHandler))
    }

    #[tokio::test]
    async fn test_initiation_installs_only_after_initialize() {
        let manager = manager();
        let transport = manager.transport_for_post(None);
        assert!(manager.registry().is_empty());

        transport.handle_post(initialize_message(1)).await.unwrap();
        assert!(manager.registry().has(transport.session_id()));
    }

    #[tokio::test]
    async fn test_continuation_reuses_transport() {
        let manager = manager();
        let transport = manager.transport_for_post(None);
        transport.handle_post(initialize_message(1)).await.unwrap();

        let again = manager.transport_for_post(Some(transport.session_id()));
        assert!(Arc::ptr_eq(&again, &transport));
    }

    #[test]
    fn test_stream_requires_known_session() {
        let manager = manager();
        assert!(matches!(
            manager.transport_for_stream(None),
            Err(TransportError::MissingSessionId)
        ));
        assert!(matches!(
            manager.transport_for_stream(Some("ghost")),
            Err(TransportError::UnknownSession(_))
        ));
        assert!(!manager.registry().has("ghost"));
    }

    #[tokio::test]
    async fn test_terminate_fires_callback_once() {
        let closed = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&closed);
        let manager = manager().with_session_closed(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let transport = manager.transport_for_post(None);
        transport.handle_post(initialize_message(1)).await.unwrap();
        let id = transport.session_id().to_string();

        assert!(manager.terminate(Some(&id)).unwrap());
        assert!(!manager.terminate(Some(&id)).unwrap());
        assert!(transport.is_closed());
        assert!(!manager.registry().has(&id));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_terminate_without_id_is_error() {
        assert!(matches!(
            manager().terminate(None),
            Err(TransportError::MissingSessionId)
        ));
    }
}
