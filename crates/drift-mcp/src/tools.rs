//! Tool argument types and MCP tool definitions.
//!
//! Each tool deserializes its arguments into a typed struct, normalizes it,
//! and serializes it back as the engine request body once the service id
//! has been resolved.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tether::{schema_for, ErrorData, Tool};

use crate::engine::Operation;
use crate::filters::{JsonbFilter, SpanWhere};

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;
const MAX_WHERE_DEPTH: usize = 8;

/// Clamp a requested page size into `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Shared behaviour of tool argument structs.
pub trait ToolArgs: DeserializeOwned + Serialize + JsonSchema + Send {
    const OPERATION: Operation;
    const DESCRIPTION: &'static str;

    fn observable_service_id(&self) -> Option<&str>;
    fn set_observable_service_id(&mut self, id: String);

    /// Check required fields and apply defaults.
    fn normalize(&mut self) -> Result<(), String> {
        Ok(())
    }
}

/// Deserialize and normalize raw tool arguments.
pub fn parse_args<A: ToolArgs>(arguments: Value) -> Result<A, ErrorData> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    let tool = A::OPERATION.tool_name();
    let mut args: A = serde_json::from_value(arguments)
        .map_err(|e| ErrorData::invalid_params(format!("Invalid arguments for {}: {}", tool, e)))?;
    args.normalize()
        .map_err(|e| ErrorData::invalid_params(format!("Invalid arguments for {}: {}", tool, e)))?;
    Ok(args)
}

fn check_filters(filter: Option<&SpanWhere>, jsonb: Option<&[JsonbFilter]>) -> Result<(), String> {
    if let Some(filter) = filter {
        if filter.depth() > MAX_WHERE_DEPTH {
            return Err(format!("where nests deeper than {} levels", MAX_WHERE_DEPTH));
        }
    }
    for f in jsonb.unwrap_or_default() {
        f.validate()?;
    }
    Ok(())
}

macro_rules! service_id_accessors {
    () => {
        fn observable_service_id(&self) -> Option<&str> {
            self.observable_service_id.as_deref()
        }

        fn set_observable_service_id(&mut self, id: String) {
            self.observable_service_id = Some(id);
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum SpanOrderField {
    Timestamp,
    Duration,
    Name,
    StatusCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpanOrder {
    pub field: SpanOrderField,
    pub direction: SortDirection,
}

/// Search spans.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QuerySpansArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Service to query (defaults to the configured or discovered service)")]
    pub observable_service_id: Option<String>,

    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Filter expression over span fields")]
    pub where_: Option<SpanWhere>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Conditions on inputValue/outputValue/metadata/status")]
    pub jsonb_filters: Option<Vec<JsonbFilter>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<SpanOrder>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Page size (default 20, max 100)")]
    pub limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Number of spans to skip")]
    pub offset: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Include recorded request/response payloads")]
    pub include_input_output: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Truncate each payload to this many characters")]
    pub max_payload_length: Option<u32>,
}

impl ToolArgs for QuerySpansArgs {
    const OPERATION: Operation = Operation::QuerySpans;
    const DESCRIPTION: &'static str = "Search recorded spans with filters on span fields and payload JSON. \
        Returns matching spans with timing and status; set includeInputOutput to see payloads.";

    service_id_accessors!();

    fn normalize(&mut self) -> Result<(), String> {
        check_filters(self.where_.as_ref(), self.jsonb_filters.as_deref())?;
        self.limit = Some(clamp_limit(self.limit));
        Ok(())
    }
}

/// Describe payload structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GetSchemaArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Service to query (defaults to the configured or discovered service)")]
    pub observable_service_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Restrict to spans from this package, e.g. http")]
    pub package_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrumentation_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Restrict to spans with this name")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Include an example payload for each schema")]
    pub show_example: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload_length: Option<u32>,
}

impl ToolArgs for GetSchemaArgs {
    const OPERATION: Operation = Operation::GetSchema;
    const DESCRIPTION: &'static str = "Describe the structure of recorded input/output payloads so \
        you can write jsonPath filters. Narrow with packageName, instrumentationName or name.";

    service_id_accessors!();
}

/// Span fields with enumerable values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum DistinctField {
    Name,
    PackageName,
    InstrumentationName,
    Environment,
    StatusCode,
}

/// Enumerate values of one field.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListDistinctValuesArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Service to query (defaults to the configured or discovered service)")]
    pub observable_service_id: Option<String>,

    #[schemars(description = "Field whose distinct values to list")]
    pub field: DistinctField,

    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_: Option<SpanWhere>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonb_filters: Option<Vec<JsonbFilter>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Maximum values to return (default 20, max 100)")]
    pub limit: Option<u32>,
}

impl ToolArgs for ListDistinctValuesArgs {
    const OPERATION: Operation = Operation::ListDistinctValues;
    const DESCRIPTION: &'static str = "List the distinct values of a span field (e.g. every endpoint \
        name or package) with occurrence counts. Useful before building filters.";

    service_id_accessors!();

    fn normalize(&mut self) -> Result<(), String> {
        check_filters(self.where_.as_ref(), self.jsonb_filters.as_deref())?;
        self.limit = Some(clamp_limit(self.limit));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Count,
    ErrorCount,
    ErrorRate,
    AvgDuration,
    MinDuration,
    MaxDuration,
    P50Duration,
    P95Duration,
    P99Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    Hour,
    Day,
    Week,
}

/// Aggregate metrics over matching spans.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AggregateSpansArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Service to query (defaults to the configured or discovered service)")]
    pub observable_service_id: Option<String>,

    #[schemars(description = "Metrics to compute; at least one")]
    pub metrics: Vec<Metric>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Fields to group rows by")]
    pub group_by: Option<Vec<DistinctField>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Additionally bucket rows by time")]
    pub time_bucket: Option<TimeBucket>,

    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_: Option<SpanWhere>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonb_filters: Option<Vec<JsonbFilter>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Maximum rows (default 20, max 100)")]
    pub limit: Option<u32>,
}

impl ToolArgs for AggregateSpansArgs {
    const OPERATION: Operation = Operation::AggregateSpans;
    const DESCRIPTION: &'static str = "Compute counts, error rates and latency percentiles over \
        matching spans, optionally grouped by field and time bucket.";

    service_id_accessors!();

    fn normalize(&mut self) -> Result<(), String> {
        if self.metrics.is_empty() {
            return Err("metrics must contain at least one metric".to_string());
        }
        check_filters(self.where_.as_ref(), self.jsonb_filters.as_deref())?;
        self.limit = Some(clamp_limit(self.limit));
        Ok(())
    }
}

/// Fetch a whole trace.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GetTraceArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Service to query (defaults to the configured or discovered service)")]
    pub observable_service_id: Option<String>,

    #[schemars(description = "Trace to fetch")]
    pub trace_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_input_output: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload_length: Option<u32>,
}

impl ToolArgs for GetTraceArgs {
    const OPERATION: Operation = Operation::GetTrace;
    const DESCRIPTION: &'static str = "Fetch every span of one trace as a parent/child call tree.";

    service_id_accessors!();

    fn normalize(&mut self) -> Result<(), String> {
        if self.trace_id.trim().is_empty() {
            return Err("traceId must not be empty".to_string());
        }
        Ok(())
    }
}

/// Fetch spans by id.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GetSpansByIdsArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Service to query (defaults to the configured or discovered service)")]
    pub observable_service_id: Option<String>,

    #[schemars(description = "Span ids to fetch (at most 100)")]
    pub ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_input_output: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload_length: Option<u32>,
}

impl ToolArgs for GetSpansByIdsArgs {
    const OPERATION: Operation = Operation::GetSpansByIds;
    const DESCRIPTION: &'static str = "Fetch specific spans by id, e.g. ones returned by an earlier query.";

    service_id_accessors!();

    fn normalize(&mut self) -> Result<(), String> {
        self.ids.retain(|id| !id.trim().is_empty());
        if self.ids.is_empty() {
            return Err("ids must contain at least one span id".to_string());
        }
        if self.ids.len() > MAX_LIMIT as usize {
            return Err(format!("ids may contain at most {} span ids", MAX_LIMIT));
        }
        Ok(())
    }
}

fn definition<A: ToolArgs>() -> Tool {
    Tool::new(A::OPERATION.tool_name(), A::DESCRIPTION)
        .with_input_schema(schema_for::<A>())
        .read_only()
        .open_world()
}

/// All tool definitions, in a stable order.
pub fn definitions() -> Vec<Tool> {
    vec![
        definition::<QuerySpansArgs>(),
        definition::<GetSchemaArgs>(),
        definition::<ListDistinctValuesArgs>(),
        definition::<AggregateSpansArgs>(),
        definition::<GetTraceArgs>(),
        definition::<GetSpansByIdsArgs>(),
    ]
}
