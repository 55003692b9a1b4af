use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use super::json::balanced_objects;
use super::{CallExtractor, Extraction, ToolCall};

static TOOL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:tool|tool_name)"\s*:\s*"([A-Za-z0-9_.:\-]+)""#).expect("valid regex")
});

static ARGS_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:args|arguments|input|parameters)"\s*:\s*\{"#).expect("valid regex")
});

static FINAL_RESPONSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""action"\s*:\s*"final"\s*,\s*"response"\s*:\s*("(?:[^"\\]|\\.)*")"#)
        .expect("valid regex")
});

/// Last resort for malformed JSON: pulls the tool name and the first
/// parseable argument object out with regular expressions.
pub struct RegexSalvage;

impl CallExtractor for RegexSalvage {
    fn name(&self) -> &'static str {
        "regex_salvage"
    }

    fn extract(&self, text: &str) -> Option<Extraction> {
        if let Some(name) = TOOL_NAME.captures(text).map(|caps| caps[1].to_string()) {
            let arguments = ARGS_START
                .find(text)
                .and_then(|found| {
                    let from = found.end() - 1;
                    balanced_objects(&text[from..]).into_iter().next()
                })
                .and_then(|span| serde_json::from_str(span).ok())
                .unwrap_or_else(|| Value::Object(Map::new()));
            return Some(Extraction::Calls(vec![ToolCall::new(name, arguments)]));
        }
        let quoted = FINAL_RESPONSE.captures(text)?;
        serde_json::from_str::<String>(&quoted[1])
            .ok()
            .map(Extraction::Final)
    }
}
