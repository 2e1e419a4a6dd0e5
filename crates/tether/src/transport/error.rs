//! Transport-level errors and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use thiserror::Error;

use crate::types::error::ErrorData;
use crate::types::jsonrpc::reply;

/// Session protocol violations and failures while handling a request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Bad Request: Mcp-Session-Id header is required")]
    MissingSessionId,

    #[error("Bad Request: no session with id {0}")]
    UnknownSession(String),

    #[error("Bad Request: Server not initialized")]
    NotInitialized,

    #[error("Invalid Request: Server already initialized")]
    AlreadyInitialized,

    #[error("Session has been closed")]
    SessionClosed,

    #[error("Conflict: only one standalone stream is allowed per session")]
    StreamConflict,

    #[error("Parse error: {0}")]
    InvalidMessage(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl TransportError {
    pub fn status(&self) -> StatusCode {
        match self {
            TransportError::MissingSessionId
            | TransportError::UnknownSession(_)
            | TransportError::NotInitialized
            | TransportError::AlreadyInitialized
            | TransportError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            TransportError::SessionClosed => StatusCode::NOT_FOUND,
            TransportError::StreamConflict => StatusCode::CONFLICT,
            TransportError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client errors are answered and forgotten; everything else goes to the
    /// manager's error callback.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    pub fn error_data(&self) -> ErrorData {
        match self {
            TransportError::InvalidMessage(_) => ErrorData::parse_error(self.to_string()),
            TransportError::AlreadyInitialized => ErrorData::invalid_request(self.to_string()),
            TransportError::Internal(_) => ErrorData::internal_error("Internal server error"),
            _ => ErrorData::connection_error(self.to_string()),
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        let body = reply(Value::Null, Err(self.error_data()));
        (self.status(), Json(body)).into_response()
    }
}
