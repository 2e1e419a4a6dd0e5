//! MCP Protocol Types
//!
//! The subset of the MCP 2025-06-18 schema a tools-only server needs:
//!
//! - `jsonrpc` - JSON-RPC 2.0 envelopes
//! - `error` - error objects and standard codes
//! - `protocol` - initialize handshake and capabilities
//! - `tool` - tool definitions and call results
//! - `content` - content blocks returned by tools

pub mod content;
pub mod error;
pub mod jsonrpc;
pub mod protocol;
pub mod tool;
