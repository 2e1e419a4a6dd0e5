//! Render engine responses as tool text: a one-line summary when the
//! payload has recognizable counts, then the pretty-printed JSON.

use serde_json::Value;

use crate::engine::Operation;

pub fn render(operation: Operation, value: &Value) -> String {
    let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    match summarize(operation, value) {
        Some(summary) => format!("{}\n\n{}", summary, body),
        None => body,
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

/// One-line summary, or `None` when nothing countable is present.
pub fn summarize(operation: Operation, value: &Value) -> Option<String> {
    let obj = value.as_object()?;
    let total = obj.get("total").and_then(Value::as_u64);
    let has_more = obj.get("hasMore").and_then(Value::as_bool).unwrap_or(false);

    let mut summary = if let Some(spans) = obj.get("spans").and_then(Value::as_array) {
        let noun = plural(spans.len(), "span", "spans");
        match operation {
            Operation::GetTrace => format!("Trace contains {}", noun),
            _ => format!("Found {}", noun),
        }
    } else if let Some(rows) = obj.get("results").and_then(Value::as_array) {
        format!("Computed {}", plural(rows.len(), "aggregate row", "aggregate rows"))
    } else if let Some(values) = obj.get("values").and_then(Value::as_array) {
        format!("Found {}", plural(values.len(), "distinct value", "distinct values"))
    } else if let Some(total) = total {
        format!("{} total", total)
    } else {
        return None;
    };

    if let Some(total) = total {
        if !summary.ends_with("total") {
            summary.push_str(&format!(" of {} total", total));
        }
    }
    if has_more {
        summary.push_str("; more available (increase offset)");
    }
    summary.push('.');
    Some(summary)
}
