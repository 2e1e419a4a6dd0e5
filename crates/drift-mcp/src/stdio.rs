//! Stdio MCP transport for clients that spawn the server as a subprocess.
//!
//! stdout carries protocol messages only; logs go to stderr.

use anyhow::{Context, Result};
use std::sync::Arc;
use tether::McpServer;
use tracing::info;

use crate::handler::DriftHandler;

/// Serve one session over stdin/stdout until EOF.
pub async fn run(handler: Arc<DriftHandler>) -> Result<()> {
    info!("Stdio MCP server running");

    tether::transport::stdio::serve_stdio(McpServer::new(handler))
        .await
        .context("Stdio transport failed")?;

    info!("Stdio MCP server shutdown");
    Ok(())
}
