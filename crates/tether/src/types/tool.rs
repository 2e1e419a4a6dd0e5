//! Tool definitions and call results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::content::Content;

/// A tool definition as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub input_schema: ToolSchema,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: Some(description.into()),
            input_schema: ToolSchema::empty(),
            annotations: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_input_schema(mut self, schema: ToolSchema) -> Self {
        self.input_schema = schema;
        self
    }

    /// Mark this tool as read-only and idempotent.
    pub fn read_only(mut self) -> Self {
        let annotations = self.annotations.take().unwrap_or_default();
        self.annotations = Some(ToolAnnotations {
            read_only_hint: Some(true),
            idempotent_hint: Some(true),
            ..annotations
        });
        self
    }

    /// Mark this tool as talking to something outside the server.
    pub fn open_world(mut self) -> Self {
        let annotations = self.annotations.take().unwrap_or_default();
        self.annotations = Some(ToolAnnotations {
            open_world_hint: Some(true),
            ..annotations
        });
        self
    }
}

/// JSON Schema for tool input.
///
/// Keys other than `type`/`properties`/`required` (e.g. `definitions` for
/// recursive types) are preserved in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolSchema {
    /// Schema for a tool with no parameters.
    pub fn empty() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: None,
            required: None,
            extra: Map::new(),
        }
    }

    /// Build from a JSON Schema document. Non-objects yield an empty schema;
    /// `$schema` and `title` are dropped since clients ignore them.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::empty();
        };

        let schema_type = map
            .remove("type")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "object".to_string());
        let properties = match map.remove("properties") {
            Some(Value::Object(props)) => Some(props),
            _ => None,
        };
        let required = match map.remove("required") {
            Some(Value::Array(arr)) => Some(
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        };
        map.remove("$schema");
        map.remove("title");

        Self {
            schema_type,
            properties,
            required,
            extra: map,
        }
    }
}

impl Default for ToolSchema {
    fn default() -> Self {
        Self::empty()
    }
}

/// Tool behavior hints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

/// Params of `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<Content>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl CallToolResult {
    pub fn success(content: Vec<Content>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::success(vec![Content::text(text)])
    }

    /// A failed call the model should read and react to.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(message)],
            is_error: true,
        }
    }

    /// Concatenated text of all content blocks.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(Content::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Result of `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl ListToolsResult {
    pub fn all(tools: Vec<Tool>) -> Self {
        Self {
            tools,
            next_cursor: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_only_tool() {
        let tool = Tool::new("get_trace", "Fetch one trace")
            .with_title("Get trace")
            .read_only()
            .open_world();

        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["name"], "get_trace");
        assert_eq!(json["inputSchema"]["type"], "object");
        assert_eq!(json["annotations"]["readOnlyHint"], true);
        assert_eq!(json["annotations"]["idempotentHint"], true);
        assert_eq!(json["annotations"]["openWorldHint"], true);
    }

    #[test]
    fn test_schema_keeps_definitions() {
        let schema = ToolSchema::from_value(json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": "Args",
            "type": "object",
            "properties": { "where": { "$ref": "#/definitions/Where" } },
            "required": ["where"],
            "definitions": { "Where": { "type": "object" } }
        }));

        assert_eq!(schema.required, Some(vec!["where".to_string()]));
        assert!(schema.extra.contains_key("definitions"));
        assert!(!schema.extra.contains_key("$schema"));

        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["definitions"]["Where"]["type"], "object");
        assert!(json.get("title").is_none());
    }

    #[test]
    fn test_call_tool_result_error() {
        let result = CallToolResult::error("No service configured");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isError"], true);
        assert_eq!(json["content"][0]["text"], "No service configured");

        let ok = serde_json::to_value(CallToolResult::text("fine")).unwrap();
        assert!(ok.get("isError").is_none());
    }
}
