use serde_json::{Map, Value};

use super::{Extraction, ToolCall};

const NAME_KEYS: [&str; 3] = ["tool", "tool_name", "name"];
const ARG_KEYS: [&str; 4] = ["args", "arguments", "input", "parameters"];

/// Reads a parsed JSON value as tool calls or a final directive.
pub(super) fn interpret(value: &Value) -> Option<Extraction> {
    match value {
        Value::Array(items) => {
            let calls: Vec<ToolCall> = items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(call_from_object)
                .collect();
            (!calls.is_empty()).then_some(Extraction::Calls(calls))
        }
        Value::Object(map) => {
            if let Some(answer) = final_response(map) {
                return Some(Extraction::Final(answer));
            }
            for key in ["tool_calls", "calls"] {
                if let Some(nested @ Value::Array(_)) = map.get(key) {
                    return interpret(nested);
                }
            }
            call_from_object(map).map(|call| Extraction::Calls(vec![call]))
        }
        _ => None,
    }
}

/// Merges the interpretations of several values: calls in order, or the
/// first final directive when no calls were found.
pub(super) fn interpret_all<'a, I>(values: I) -> Option<Extraction>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut calls = Vec::new();
    let mut answer = None;
    for value in values {
        match interpret(value) {
            Some(Extraction::Calls(found)) => calls.extend(found),
            Some(Extraction::Final(text)) if answer.is_none() => answer = Some(text),
            _ => {}
        }
    }
    if !calls.is_empty() {
        Some(Extraction::Calls(calls))
    } else {
        answer.map(Extraction::Final)
    }
}

fn final_response(map: &Map<String, Value>) -> Option<String> {
    let action = map.get("action").and_then(Value::as_str)?;
    if !action.eq_ignore_ascii_case("final") {
        return None;
    }
    Some(match map.get("response") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

fn call_from_object(map: &Map<String, Value>) -> Option<ToolCall> {
    if let Some(Value::Object(function)) = map.get("function") {
        return call_from_object(function);
    }
    let (key, name) = NAME_KEYS.iter().find_map(|key| {
        map.get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| (*key, name))
    })?;
    let arguments = ARG_KEYS.iter().find_map(|key| map.get(*key));
    // A bare `name` field is too common in ordinary data to count on its own.
    if key == "name" && arguments.is_none() {
        return None;
    }
    Some(ToolCall::new(name, normalise_arguments(arguments)))
}

fn normalise_arguments(arguments: Option<&Value>) -> Value {
    match arguments {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::String(raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        Some(other) => other.clone(),
    }
}

/// Top-level balanced `{...}` spans in `text`, skipping braces inside
/// strings.
pub(super) fn balanced_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;
    for (index, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(index);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(begin) = start.take()
                {
                    spans.push(&text[begin..=index]);
                }
            }
            _ => {}
        }
    }
    spans
}

pub(super) fn parse_objects(text: &str) -> Vec<Value> {
    balanced_objects(text)
        .into_iter()
        .filter_map(|span| serde_json::from_str(span).ok())
        .collect()
}
