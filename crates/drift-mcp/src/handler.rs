//! MCP handler: resolves the service, forwards to the engine, renders text.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tether::{CallToolResult, ErrorData, Handler, Implementation, ServerCapabilities, Tool};
use tracing::{info, warn, Instrument};

use driftconf::DriftConfig;

use crate::engine::{EngineClient, EngineError, Operation};
use crate::format;
use crate::resolver::{DiscoveryOptions, ServiceResolver};
use crate::tools::{
    self, AggregateSpansArgs, GetSchemaArgs, GetSpansByIdsArgs, GetTraceArgs, ListDistinctValuesArgs,
    QuerySpansArgs, ToolArgs,
};

const INSTRUCTIONS: &str = "Tools for exploring API traffic recorded by Tusk Drift: spans, traces, \
payload schemas and aggregate metrics. Start with list_distinct_values or get_schema to learn what \
exists, then narrow with query_spans and drill into a request with get_trace.";

/// Handler shared by every session.
pub struct DriftHandler {
    resolver: Arc<ServiceResolver>,
    engine: EngineClient,
    tools: Vec<Tool>,
}

impl DriftHandler {
    pub fn new(resolver: Arc<ServiceResolver>, engine: EngineClient) -> Self {
        Self {
            resolver,
            engine,
            tools: tools::definitions(),
        }
    }

    /// Build the resolver and engine client from config and run discovery.
    pub async fn from_config(config: &DriftConfig) -> Result<Self, EngineError> {
        let options = DiscoveryOptions {
            max_depth: config.service.max_depth,
            stop_at_match: config.service.stop_at_match,
        };
        let resolver = Arc::new(ServiceResolver::new(config.service.default_id.clone(), options));
        resolver.discover(&config.service.workspace_roots).await;

        if !resolver.has_services() {
            warn!(
                "No Tusk Drift service found; callers must pass observableServiceId \
                 (or set TUSK_DRIFT_SERVICE_ID / add .tusk/config.yaml)"
            );
        }

        let engine = EngineClient::from_config(&config.api)?;
        if !engine.has_api_key() {
            warn!("TUSK_API_KEY is not set; tool calls will fail until it is configured");
        }
        info!(api = %engine.base_url(), "Engine client ready");

        Ok(Self::new(resolver, engine))
    }

    pub fn resolver(&self) -> &Arc<ServiceResolver> {
        &self.resolver
    }

    async fn run<A: ToolArgs>(&self, arguments: Value) -> Result<CallToolResult, ErrorData> {
        let mut args: A = tools::parse_args(arguments)?;

        let service_id = match self.resolver.resolve_service_id(args.observable_service_id()) {
            Ok(id) => id,
            Err(e) => return Ok(CallToolResult::error(e.to_string())),
        };
        tracing::Span::current().record("service_id", service_id.as_str());
        args.set_observable_service_id(service_id);

        let body = serde_json::to_value(&args)
            .map_err(|e| ErrorData::internal_error(format!("Failed to encode request: {}", e)))?;

        match self.engine.call(A::OPERATION, &body).await {
            Ok(value) => Ok(CallToolResult::text(format::render(A::OPERATION, &value))),
            Err(e) => {
                warn!(error = %e, "Engine call failed");
                Ok(CallToolResult::error(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Handler for DriftHandler {
    fn tools(&self) -> Vec<Tool> {
        self.tools.clone()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, ErrorData> {
        let Some(operation) = Operation::from_tool_name(name) else {
            return Err(ErrorData::tool_not_found(name));
        };

        let span = tracing::info_span!(
            "drift.tool",
            tool = name,
            service_id = tracing::field::Empty
        );

        async move {
            match operation {
                Operation::QuerySpans => self.run::<QuerySpansArgs>(arguments).await,
                Operation::GetSchema => self.run::<GetSchemaArgs>(arguments).await,
                Operation::ListDistinctValues => self.run::<ListDistinctValuesArgs>(arguments).await,
                Operation::AggregateSpans => self.run::<AggregateSpansArgs>(arguments).await,
                Operation::GetTrace => self.run::<GetTraceArgs>(arguments).await,
                Operation::GetSpansByIds => self.run::<GetSpansByIdsArgs>(arguments).await,
            }
        }
        .instrument(span)
        .await
    }

    fn server_info(&self) -> Implementation {
        Implementation::new("drift-mcp", env!("CARGO_PKG_VERSION")).with_title("Tusk Drift")
    }

    fn instructions(&self) -> Option<String> {
        Some(format!("{}\n\n{}", INSTRUCTIONS, self.resolver.services_description()))
    }

    fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities::default().enable_tools()
    }
}
