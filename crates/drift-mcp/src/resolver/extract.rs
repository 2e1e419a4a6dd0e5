//! Best-effort extraction of `service.id` and `service.name` from a
//! `.tusk/config.yaml`.
//!
//! Only those two keys are read. Anything unexpected yields `None` rather
//! than an error.

use regex::Regex;
use std::sync::LazyLock;

static BLOCK_START: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^service[ \t]*:[ \t]*(?:#.*)?$").ok());

static INLINE_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^service[ \t]*:[ \t]*\{(.*)\}[ \t]*(?:#.*)?$").ok());

static FIELD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([ \t]+)(id|name)[ \t]*:(.*)$").ok());

static INLINE_FIELD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:^|,)[ \t]*(id|name)[ \t]*:[ \t]*([^,]*)").ok());

/// Pull `(id, name)` out of the `service:` block. `None` when there is no
/// usable id.
pub fn parse_service_config(text: &str) -> Option<(String, Option<String>)> {
    let block_start = BLOCK_START.as_ref()?;
    let inline_block = INLINE_BLOCK.as_ref()?;
    let field = FIELD.as_ref()?;
    let inline_field = INLINE_FIELD.as_ref()?;

    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));

    let mut id = None;
    let mut name = None;

    while let Some(line) = lines.next() {
        if let Some(caps) = inline_block.captures(line) {
            for pair in inline_field.captures_iter(&caps[1]) {
                assign(&mut id, &mut name, &pair[1], &pair[2]);
            }
            break;
        }

        if !block_start.is_match(line) {
            continue;
        }

        // Children share the indentation of the first indented line
        let mut child_indent: Option<String> = None;
        for line in lines.by_ref() {
            if is_blank_or_comment(line) {
                continue;
            }
            if !line.starts_with([' ', '\t']) {
                break;
            }
            let Some(caps) = field.captures(line) else {
                if child_indent.is_none() {
                    child_indent = Some(leading_whitespace(line).to_string());
                }
                continue;
            };
            let indent = caps[1].to_string();
            match child_indent {
                None => child_indent = Some(indent),
                Some(ref expected) if *expected != indent => continue,
                Some(_) => {}
            }
            assign(&mut id, &mut name, &caps[2], &caps[3]);
        }
        break;
    }

    id.map(|id| (id, name))
}

fn assign(id: &mut Option<String>, name: &mut Option<String>, key: &str, raw: &str) {
    let slot = if key == "id" { id } else { name };
    if slot.is_none() {
        *slot = clean_value(raw);
    }
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn leading_whitespace(line: &str) -> &str {
    let end = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..end]
}

/// Strip quotes or a trailing comment from a scalar. Empty means absent.
fn clean_value(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let value = match raw.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let rest = &raw[1..];
            match rest.find(quote) {
                Some(end) => &rest[..end],
                None => rest,
            }
        }
        _ => {
            let end = raw.find(" #").or_else(|| raw.find("\t#")).unwrap_or(raw.len());
            raw[..end].trim()
        }
    };

    if value.is_empty() || value == "~" || value == "null" {
        None
    } else {
        Some(value.to_string())
    }
}
