//! MCP server: the `Handler` trait and the per-session protocol state.
//!
//! A [`Handler`] holds the application (tools, instructions) and is shared
//! across sessions. An [`McpServer`] is the cheap per-session wrapper that
//! tracks the handshake and routes JSON-RPC methods to the handler.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::Instrument;

use crate::types::error::ErrorData;
use crate::types::jsonrpc::JsonRpcMessage;
use crate::types::protocol::{Implementation, InitializeParams, InitializeResult, ServerCapabilities};
use crate::types::tool::{CallToolParams, CallToolResult, ListToolsResult, Tool};

/// Application side of an MCP server.
///
/// Object-safe so one `Arc<dyn Handler>` can back every session.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Tools advertised by `tools/list`.
    fn tools(&self) -> Vec<Tool>;

    /// Execute a tool call.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, ErrorData>;

    /// Name and version reported in `initialize`.
    fn server_info(&self) -> Implementation;

    /// Instructions for the model, returned from `initialize`.
    fn instructions(&self) -> Option<String> {
        None
    }

    fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities::default().enable_tools()
    }
}

/// One server instance, bound to one session.
pub struct McpServer {
    handler: Arc<dyn Handler>,
    client_info: OnceLock<Implementation>,
}

impl McpServer {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            client_info: OnceLock::new(),
        }
    }

    /// Client info captured by a successful `initialize`.
    pub fn client_info(&self) -> Option<&Implementation> {
        self.client_info.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.client_info.get().is_some()
    }

    /// Dispatch a JSON-RPC message.
    ///
    /// Runs inside an `mcp.dispatch` span with JSON-RPC semantic-convention
    /// fields; failures are recorded on the span. Notifications resolve to
    /// `Value::Null` and the caller must not reply.
    pub async fn handle(&self, session_id: &str, message: &JsonRpcMessage) -> Result<Value, ErrorData> {
        let request_id = message
            .id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default();

        let span = tracing::info_span!(
            "mcp.dispatch",
            rpc.system = "jsonrpc",
            rpc.method = %message.method,
            rpc.jsonrpc.request_id = %request_id,
            mcp.session_id = %session_id,
            error.type = tracing::field::Empty,
            rpc.jsonrpc.error_code = tracing::field::Empty,
        );

        async {
            let result = self.route(message).await;
            if let Err(ref error) = result {
                let span = tracing::Span::current();
                span.record("error.type", error.kind());
                span.record("rpc.jsonrpc.error_code", error.code);
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn route(&self, message: &JsonRpcMessage) -> Result<Value, ErrorData> {
        if message.is_notification() {
            match message.method.as_str() {
                "notifications/initialized" => tracing::debug!("Client finished initialization"),
                "notifications/cancelled" => tracing::debug!("Client cancelled a request"),
                other => tracing::debug!(method = %other, "Ignoring notification"),
            }
            return Ok(Value::Null);
        }

        match message.method.as_str() {
            "initialize" => self.initialize(message),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => to_value(&ListToolsResult::all(self.handler.tools())),
            "tools/call" => self.call_tool(message).await,
            other => Err(ErrorData::method_not_found(other)),
        }
    }

    fn initialize(&self, message: &JsonRpcMessage) -> Result<Value, ErrorData> {
        let params: InitializeParams = parse_params(message, "initialize")?;

        self.client_info
            .set(params.client_info.clone())
            .map_err(|_| ErrorData::invalid_request("Server already initialized"))?;

        tracing::info!(
            client_name = %params.client_info.name,
            client_version = %params.client_info.version,
            protocol_version = %params.protocol_version,
            "Client initialized"
        );

        let mut result = InitializeResult::new(self.handler.server_info(), self.handler.capabilities());
        if let Some(instructions) = self.handler.instructions() {
            result = result.with_instructions(instructions);
        }
        to_value(&result)
    }

    async fn call_tool(&self, message: &JsonRpcMessage) -> Result<Value, ErrorData> {
        let params: CallToolParams = parse_params(message, "tools/call")?;
        let arguments = Value::Object(params.arguments.unwrap_or_default());

        let span = tracing::info_span!("mcp.tool.call", mcp.tool.name = %params.name);
        let result = self
            .handler
            .call_tool(&params.name, arguments)
            .instrument(span)
            .await?;

        to_value(&result)
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(message: &JsonRpcMessage, method: &str) -> Result<T, ErrorData> {
    let params = message
        .params
        .clone()
        .ok_or_else(|| ErrorData::invalid_params(format!("Missing {} params", method)))?;
    serde_json::from_value(params)
        .map_err(|e| ErrorData::invalid_params(format!("Invalid {} params: {}", method, e)))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ErrorData> {
    serde_json::to_value(value)
        .map_err(|e| ErrorData::internal_error(format!("Failed to serialize result: {}", e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Minimal handler shared by the crate's unit tests.
    pub(crate) struct EchoHandler;

    #[async_trait]
    impl Handler for EchoHandler {
        fn tools(&self) -> Vec<Tool> {
            vec![Tool::new("echo", "Echo arguments back").read_only()]
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, ErrorData> {
            match name {
                "echo" => Ok(CallToolResult::text(arguments.to_string())),
                "boom" => panic!("handler exploded"),
                other => Err(ErrorData::tool_not_found(other)),
            }
        }

        fn server_info(&self) -> Implementation {
            Implementation::new("echo", "0.0.1")
        }

        fn instructions(&self) -> Option<String> {
            Some("Echoes things.".to_string())
        }
    }

    pub(crate) fn initialize_message(id: i64) -> JsonRpcMessage {
        JsonRpcMessage::request(
            id,
            "initialize",
            Some(json!({
                "protocolVersion": "2025-06-18",
                "capabilities": {},
                "clientInfo": { "name": "test-client", "version": "1.0" }
            })),
        )
    }

    fn server() -> McpServer {
        McpServer::new(Arc::new(EchoHandler))
    }

    #[tokio::test]
    async fn test_initialize_records_client_and_returns_instructions() {
        let server = server();
        let result = server.handle("s1", &initialize_message(1)).await.unwrap();

        assert_eq!(result["serverInfo"]["name"], "echo");
        assert_eq!(result["instructions"], "Echoes things.");
        assert_eq!(server.client_info().unwrap().name, "test-client");
    }

    #[tokio::test]
    async fn test_second_initialize_rejected() {
        let server = server();
        server.handle("s1", &initialize_message(1)).await.unwrap();

        let err = server.handle("s1", &initialize_message(2)).await.unwrap_err();
        assert_eq!(err.code, ErrorData::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_tools_list_and_call() {
        let server = server();

        let list = server
            .handle("s1", &JsonRpcMessage::request(2, "tools/list", None))
            .await
            .unwrap();
        assert_eq!(list["tools"][0]["name"], "echo");

        let call = JsonRpcMessage::request(
            3,
            "tools/call",
            Some(json!({ "name": "echo", "arguments": { "x": 1 } })),
        );
        let result = server.handle("s1", &call).await.unwrap();
        assert_eq!(result["content"][0]["text"], "{\"x\":1}");
    }

    #[tokio::test]
    async fn test_unknown_method_and_missing_params() {
        let server = server();

        let err = server
            .handle("s1", &JsonRpcMessage::request(4, "resources/list", None))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorData::METHOD_NOT_FOUND);

        let err = server
            .handle("s1", &JsonRpcMessage::request(5, "tools/call", None))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorData::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_notification_resolves_to_null() {
        let server = server();
        let note = JsonRpcMessage::notification("notifications/initialized", None);

        assert_eq!(server.handle("s1", &note).await.unwrap(), Value::Null);
    }
}
