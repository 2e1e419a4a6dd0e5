//! Streamable HTTP Transport
//!
//! - POST / - JSON-RPC message in, JSON-RPC reply (or 202) out
//! - GET / - standalone SSE stream for server-initiated messages
//! - DELETE / - session termination
//!
//! Session ID travels in the `mcp-session-id` header.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;

use super::{SessionManager, TransportError, SESSION_HEADER};
use crate::session::{PostOutcome, SessionTransport};
use crate::types::jsonrpc::JsonRpcMessage;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

fn session_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Attach the session id header once the session exists.
fn with_session(mut response: Response, transport: &SessionTransport) -> Response {
    if transport.is_initialized() {
        if let Ok(value) = HeaderValue::from_str(transport.session_id()) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    response
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Handle a JSON-RPC message posted to the endpoint.
///
/// A missing or unknown session id starts a new session; only `initialize`
/// can complete that handshake.
#[tracing::instrument(skip(manager, headers, body), fields(session_id = tracing::field::Empty))]
pub async fn post_handler(
    State(manager): State<Arc<SessionManager>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let message: JsonRpcMessage = match serde_json::from_slice(&body) {
        Ok(m) => m,
        Err(e) => {
            return TransportError::InvalidMessage(format!("Invalid JSON-RPC: {}", e)).into_response();
        }
    };

    let hint = session_header(&headers);
    let transport = manager.transport_for_post(hint.as_deref());
    tracing::Span::current().record("session_id", transport.session_id());

    tracing::debug!(
        method = %message.method,
        notification = message.is_notification(),
        "Processing MCP message (streamable)"
    );

    let outcome = AssertUnwindSafe(transport.handle_post(message))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(PostOutcome::Accepted)) => with_session(StatusCode::ACCEPTED.into_response(), &transport),
        Ok(Ok(PostOutcome::Reply(reply))) => with_session((StatusCode::OK, Json(reply)).into_response(), &transport),
        Ok(Err(err)) => {
            if !err.is_client_error() {
                manager.report_error(&err);
            }
            err.into_response()
        }
        Err(panic) => {
            let err = TransportError::Internal(panic_message(panic));
            manager.report_error(&err);
            err.into_response()
        }
    }
}

/// Open the standalone SSE stream for an existing session.
#[tracing::instrument(skip(manager, headers), fields(session_id = tracing::field::Empty))]
pub async fn get_handler(State(manager): State<Arc<SessionManager>>, headers: HeaderMap) -> Response {
    let hint = session_header(&headers);
    let transport = match manager.transport_for_stream(hint.as_deref()) {
        Ok(t) => t,
        Err(err) => return err.into_response(),
    };
    tracing::Span::current().record("session_id", transport.session_id());

    let rx = match transport.attach_stream() {
        Ok(rx) => rx,
        Err(err) => return err.into_response(),
    };

    tracing::info!(session_id = %transport.session_id(), "SSE stream opened");

    let sse = Sse::new(ReceiverStream::new(rx))
        .keep_alive(KeepAlive::new().interval(KEEPALIVE_INTERVAL).text("ping"));
    with_session(sse.into_response(), &transport)
}

/// Terminate a session. Unknown ids are a no-op.
#[tracing::instrument(skip(manager, headers), fields(session_id = tracing::field::Empty))]
pub async fn delete_handler(State(manager): State<Arc<SessionManager>>, headers: HeaderMap) -> Response {
    let hint = session_header(&headers);
    if let Some(ref id) = hint {
        tracing::Span::current().record("session_id", id.as_str());
    }

    match manager.terminate(hint.as_deref()) {
        Ok(true) => {
            tracing::info!("Session terminated");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => {
            tracing::debug!("DELETE for unknown session ignored");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_header_ignores_blank() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_header(&headers), None);

        headers.insert(SESSION_HEADER, HeaderValue::from_static("   "));
        assert_eq!(session_header(&headers), None);

        headers.insert(SESSION_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(session_header(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "handler panicked");
    }
}
