//! drift-mcp - Tusk Drift traffic analysis over MCP
//!
//! This library provides:
//! - `resolver`: service discovery and per-request service id resolution
//! - `engine`: HTTP client for the remote query engine
//! - `filters`: the span filter contract shared with the engine
//! - `tools`: tool argument types and definitions
//! - `format`: rendering engine responses as tool text
//! - `handler`: the `tether::Handler` tying the above together
//! - `serve`: streamable HTTP transport with health endpoint
//! - `stdio`: stdio transport
//! - `telemetry`: tracing and OpenTelemetry setup

pub mod engine;
pub mod filters;
pub mod format;
pub mod handler;
pub mod resolver;
pub mod serve;
pub mod stdio;
pub mod telemetry;
pub mod tools;
