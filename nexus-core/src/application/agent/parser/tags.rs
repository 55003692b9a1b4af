use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use super::json::{interpret, interpret_all, parse_objects};
use super::{CallExtractor, Extraction, ToolCall};

static TOOL_CALL_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").expect("valid regex")
});

static NAMED_TOOL_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<tool\s+name\s*=\s*["']([^"']+)["']\s*>(.*?)</tool>"#).expect("valid regex")
});

/// `<tool_call>{...}</tool_call>` and `<tool name="x">{...}</tool>` tags.
pub struct LegacyTags;

impl CallExtractor for LegacyTags {
    fn name(&self) -> &'static str {
        "legacy_tags"
    }

    fn extract(&self, text: &str) -> Option<Extraction> {
        let mut calls = Vec::new();
        for caps in TOOL_CALL_TAG.captures_iter(text) {
            let body = caps[1].trim();
            let extraction = match serde_json::from_str::<Value>(body) {
                Ok(value) => interpret(&value),
                Err(_) => interpret_all(&parse_objects(body)),
            };
            if let Some(Extraction::Calls(found)) = extraction {
                calls.extend(found);
            }
        }
        for caps in NAMED_TOOL_TAG.captures_iter(text) {
            let body = caps[2].trim();
            let arguments = if body.is_empty() {
                Value::Object(Map::new())
            } else {
                serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
            };
            calls.push(ToolCall::new(caps[1].trim(), arguments));
        }
        (!calls.is_empty()).then_some(Extraction::Calls(calls))
    }
}
