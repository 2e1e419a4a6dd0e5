//! Content blocks carried by tool results.

use serde::{Deserialize, Serialize};

/// Content block in a tool result.
///
/// Only text is produced by this crate's servers; the tag layout matches the
/// MCP schema so other block kinds can be added without breaking clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text { text: String },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
        }
    }
}
