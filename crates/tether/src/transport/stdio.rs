//! Stdio transport: one JSON-RPC message per line in, one reply per line out.
//!
//! The whole process is a single session. Notifications produce no output.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::server::McpServer;
use crate::types::error::ErrorData;
use crate::types::jsonrpc::{reply, reply_to, JsonRpcMessage};

/// Serve `server` over arbitrary line-oriented streams until `reader` hits EOF.
pub async fn serve<R, W>(server: McpServer, mut reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let session_id = Uuid::new_v4().to_string();
    tracing::info!(session_id = %session_id, "Stdio session started");

    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }

        // Raw bytes: invalid UTF-8 is a parse error, not end of session.
        let response = match serde_json::from_slice::<JsonRpcMessage>(line) {
            Ok(message) => {
                let result = server.handle(&session_id, &message).await;
                if message.is_notification() {
                    None
                } else {
                    Some(reply_to(&message, result))
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable stdio message");
                Some(reply(
                    Value::Null,
                    Err(ErrorData::parse_error(format!("Invalid JSON-RPC: {}", e))),
                ))
            }
        };

        if let Some(response) = response {
            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
        }
    }

    tracing::info!(session_id = %session_id, "Stdio session ended");
    Ok(())
}

/// Serve on the process's stdin and stdout.
pub async fn serve_stdio(server: McpServer) -> std::io::Result<()> {
    serve(server, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}
