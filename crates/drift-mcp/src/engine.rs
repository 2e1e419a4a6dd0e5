//! HTTP client for the Tusk Drift query engine.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use driftconf::ApiConfig;

/// Engine failures, rendered verbatim into tool error results.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(
        "TUSK_API_KEY is not set. Export it (or set `api.key` in drift-mcp.toml) \
         to query the Tusk Drift API."
    )]
    MissingApiKey,

    #[error("Tusk API error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Request to Tusk API failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Tusk API returned invalid JSON: {0}")]
    Decode(String),
}

/// The six engine operations, one per tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    QuerySpans,
    GetSchema,
    ListDistinctValues,
    AggregateSpans,
    GetTrace,
    GetSpansByIds,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::QuerySpans,
        Operation::GetSchema,
        Operation::ListDistinctValues,
        Operation::AggregateSpans,
        Operation::GetTrace,
        Operation::GetSpansByIds,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Operation::QuerySpans => "/api/drift/query/spans",
            Operation::GetSchema => "/api/drift/query/schema",
            Operation::ListDistinctValues => "/api/drift/query/distinct",
            Operation::AggregateSpans => "/api/drift/query/aggregate",
            Operation::GetTrace => "/api/drift/query/trace",
            Operation::GetSpansByIds => "/api/drift/query/spans-by-id",
        }
    }

    pub fn tool_name(self) -> &'static str {
        match self {
            Operation::QuerySpans => "query_spans",
            Operation::GetSchema => "get_schema",
            Operation::ListDistinctValues => "list_distinct_values",
            Operation::AggregateSpans => "aggregate_spans",
            Operation::GetTrace => "get_trace",
            Operation::GetSpansByIds => "get_spans_by_ids",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.tool_name() == name)
    }
}

/// Thin JSON client; one POST per operation.
#[derive(Debug, Clone)]
pub struct EngineClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl EngineClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("drift-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, EngineError> {
        Self::new(
            &config.url,
            config.key().map(String::from),
            Duration::from_millis(config.timeout_ms),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn url_for(&self, operation: Operation) -> String {
        format!("{}{}", self.base_url, operation.path())
    }

    /// POST `body` to the operation's endpoint and return the decoded JSON.
    #[instrument(skip(self, body), fields(path = operation.path()))]
    pub async fn call(&self, operation: Operation, body: &Value) -> Result<Value, EngineError> {
        let key = self.api_key.as_deref().ok_or(EngineError::MissingApiKey)?;

        let response = self
            .http
            .post(self.url_for(operation))
            .bearer_auth(key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), bytes = text.len(), "Engine responded");

        if !status.is_success() {
            return Err(EngineError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| EngineError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_tool_name(op.tool_name()), Some(op));
        }
        assert_eq!(Operation::from_tool_name("drop_tables"), None);
    }

    #[test]
    fn test_url_join_trims_slash() {
        let client = EngineClient::new("http://engine.local/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(client.url_for(Operation::GetTrace), "http://engine.local/api/drift/query/trace");
    }

    #[test]
    fn test_blank_key_is_missing() {
        let client = EngineClient::new("http://x", Some("  ".into()), Duration::from_secs(1)).unwrap();
        assert!(!client.has_api_key());
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let client = EngineClient::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();
        let err = client
            .call(Operation::QuerySpans, &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingApiKey));
        assert!(err.to_string().contains("TUSK_API_KEY"));
    }

    #[test]
    fn test_upstream_error_text() {
        let err = EngineError::Upstream {
            status: 403,
            body: "forbidden".into(),
        };
        assert_eq!(err.to_string(), "Tusk API error (403): forbidden");
    }
}
