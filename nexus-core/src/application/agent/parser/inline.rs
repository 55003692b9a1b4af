use serde_json::Value;

use super::json::{interpret, interpret_all, parse_objects};
use super::{CallExtractor, Extraction};

/// The whole reply is one JSON document.
pub struct InlineBody;

impl CallExtractor for InlineBody {
    fn name(&self) -> &'static str {
        "inline_body"
    }

    fn extract(&self, text: &str) -> Option<Extraction> {
        let value: Value = serde_json::from_str(text.trim()).ok()?;
        match value {
            // A quoted reply may itself hold the JSON.
            Value::String(inner) => serde_json::from_str(inner.trim())
                .ok()
                .and_then(|value: Value| interpret(&value)),
            other => interpret(&other),
        }
    }
}

/// JSON objects embedded anywhere in surrounding prose.
pub struct FreePosition;

impl CallExtractor for FreePosition {
    fn name(&self) -> &'static str {
        "free_position"
    }

    fn extract(&self, text: &str) -> Option<Extraction> {
        interpret_all(&parse_objects(text))
    }
}
