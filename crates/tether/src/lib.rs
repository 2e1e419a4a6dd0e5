//! tether - MCP server plumbing for Rust
//!
//! Protocol types, a per-session server state machine and the session
//! registry that lets one logical MCP session span many HTTP requests.
//!
//! # Transports
//!
//! - **Streamable HTTP**: [`transport::router`] mounts `POST`/`GET`/`DELETE /`
//!   on top of a [`SessionManager`]. Sessions are keyed by the
//!   `mcp-session-id` header.
//! - **Stdio**: [`transport::stdio::serve`] runs a single session over
//!   newline-delimited JSON-RPC.
//!
//! # Example
//!
//! ```rust,ignore
//! use tether::{CallToolResult, ErrorData, Handler, Implementation, Tool};
//! use async_trait::async_trait;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Handler for Echo {
//!     fn tools(&self) -> Vec<Tool> {
//!         vec![Tool::new("echo", "Echo the arguments back")]
//!     }
//!
//!     async fn call_tool(&self, _name: &str, args: serde_json::Value)
//!         -> Result<CallToolResult, ErrorData>
//!     {
//!         Ok(CallToolResult::text(args.to_string()))
//!     }
//!
//!     fn server_info(&self) -> Implementation {
//!         Implementation::new("echo", "0.1.0")
//!     }
//! }
//!
//! let manager = std::sync::Arc::new(tether::SessionManager::new(std::sync::Arc::new(Echo)));
//! let app = axum::Router::new().nest("/mcp", tether::transport::router(manager));
//! ```

pub mod schema_helpers;
pub mod server;
pub mod session;
pub mod transport;
pub mod types;

pub use types::content::Content;
pub use types::error::ErrorData;
pub use types::jsonrpc::{JsonRpcMessage, RequestId};
pub use types::protocol::{Implementation, ServerCapabilities};
pub use types::tool::{CallToolResult, Tool, ToolAnnotations, ToolSchema};

pub use server::{Handler, McpServer};
pub use session::{spawn_reaper, SessionRegistry, SessionTransport};
pub use transport::{SessionManager, TransportError, SESSION_HEADER};

pub use schema_helpers::schema_for;
