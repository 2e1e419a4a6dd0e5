//! Span filter contract.
//!
//! These types only describe the shape the engine accepts; evaluation
//! happens remotely. They derive `JsonSchema` so tool input schemas come
//! straight from them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparators for string-valued span fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StringFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neq: Option<String>,

    #[serde(default, rename = "in", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Match any of these values")]
    pub in_: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_with: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_with: Option<String>,
}

/// Comparators for numeric span fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NumberFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neq: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BooleanFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<bool>,
}

/// Boolean expression over span fields. Conditions at one level are ANDed;
/// `AND`/`OR` nest further expressions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpanWhere {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Span name, e.g. the route or query")]
    pub name: Option<StringFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Instrumented package, e.g. http, pg, redis")]
    pub package_name: Option<StringFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrumentation_name: Option<StringFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<StringFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<StringFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<StringFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<StringFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Duration in milliseconds")]
    pub duration: Option<NumberFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<NumberFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_root_span: Option<BooleanFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Span was recorded before the app finished starting")]
    pub is_pre_app_start: Option<BooleanFilter>,

    #[serde(default, rename = "AND", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "All nested expressions must match")]
    pub and: Option<Vec<SpanWhere>>,

    #[serde(default, rename = "OR", skip_serializing_if = "Option::is_none")]
    #[schemars(description = "At least one nested expression must match")]
    pub or: Option<Vec<SpanWhere>>,
}

impl SpanWhere {
    /// Nesting depth of `AND`/`OR`; a flat expression is 1.
    pub fn depth(&self) -> usize {
        let nested = self
            .and
            .iter()
            .chain(self.or.iter())
            .flatten()
            .map(SpanWhere::depth)
            .max()
            .unwrap_or(0);
        nested + 1
    }
}

/// Object-valued span columns reachable by JSON path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum JsonbColumn {
    InputValue,
    OutputValue,
    Metadata,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CastAs {
    Text,
    Int,
    Float,
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decode {
    Base64,
}

/// Condition on a value inside an object-valued column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JsonbFilter {
    pub column: JsonbColumn,

    #[schemars(description = "JSON path into the column, e.g. $.body.userId")]
    pub json_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neq: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_with: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_with: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Coerce the extracted value before comparing")]
    pub cast_as: Option<CastAs>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Decode the extracted value first (e.g. base64 bodies)")]
    pub decode: Option<Decode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "JSON path applied after decoding")]
    pub decoded_json_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "true: value must be absent/null; false: must be present")]
    pub is_null: Option<bool>,
}

impl JsonbFilter {
    /// `decodedJsonPath` is only meaningful with `decode`.
    pub fn validate(&self) -> Result<(), String> {
        if self.json_path.trim().is_empty() {
            return Err("jsonbFilters[].jsonPath must not be empty".to_string());
        }
        if self.decoded_json_path.is_some() && self.decode.is_none() {
            return Err("jsonbFilters[].decodedJsonPath requires decode".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_where_wire_names() {
        let filter: SpanWhere = serde_json::from_value(json!({
            "packageName": { "in": ["http", "pg"] },
            "isRootSpan": { "eq": true },
            "OR": [
                { "statusCode": { "gte": 500 } },
                { "duration": { "gt": 1000 } }
            ]
        }))
        .unwrap();

        assert_eq!(
            filter.package_name.as_ref().unwrap().in_.as_deref(),
            Some(&["http".to_string(), "pg".to_string()][..])
        );
        assert_eq!(filter.depth(), 2);

        let back = serde_json::to_value(&filter).unwrap();
        assert_eq!(back["OR"][0]["statusCode"]["gte"], 500.0);
        assert!(back.get("name").is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = serde_json::from_value::<SpanWhere>(json!({ "nmae": { "eq": "x" } })).unwrap_err();
        assert!(err.to_string().contains("nmae"));
    }

    #[test]
    fn test_jsonb_filter() {
        let filter: JsonbFilter = serde_json::from_value(json!({
            "column": "outputValue",
            "jsonPath": "$.body",
            "decode": "base64",
            "decodedJsonPath": "$.error.code",
            "castAs": "int",
            "gte": 400
        }))
        .unwrap();
        assert_eq!(filter.column, JsonbColumn::OutputValue);
        assert_eq!(filter.cast_as, Some(CastAs::Int));
        assert!(filter.validate().is_ok());

        let orphan = JsonbFilter {
            decode: None,
            ..filter
        };
        assert!(orphan.validate().is_err());
    }
}
