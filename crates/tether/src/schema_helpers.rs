//! Tool input schemas generated from Rust types.
//!
//! Schemas are emitted as draft-07 with subschemas inlined. Recursive types
//! cannot be inlined, so schemars leaves them in `definitions`; [`ToolSchema`]
//! carries that map through untouched.

use schemars::JsonSchema;

use crate::types::tool::ToolSchema;

/// Generate the input schema for an argument type.
pub fn schema_for<T: JsonSchema>() -> ToolSchema {
    let settings = schemars::generate::SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
    });
    let generator = settings.into_generator();
    let schema = generator.into_root_schema_for::<T>();
    ToolSchema::from_value(serde_json::to_value(schema).unwrap_or_default())
}
