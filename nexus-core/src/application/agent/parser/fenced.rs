use serde_json::Value;

use super::json::{interpret_all, parse_objects};
use super::{CallExtractor, Extraction};

const CALL_LABELS: [&str; 5] = ["json", "tool_call", "tool", "tool_code", "function_call"];

struct Fence<'a> {
    label: &'a str,
    body: &'a str,
}

fn fences(text: &str) -> Vec<Fence<'_>> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let Some(newline) = after.find('\n') else {
            break;
        };
        let label = after[..newline].trim();
        let body_start = &after[newline + 1..];
        let Some(close) = body_start.find("```") else {
            break;
        };
        found.push(Fence {
            label,
            body: &body_start[..close],
        });
        rest = &body_start[close + 3..];
    }
    found
}

fn extract_from(fences: Vec<Fence<'_>>) -> Option<Extraction> {
    let values: Vec<Value> = fences
        .iter()
        .flat_map(|fence| match serde_json::from_str::<Value>(fence.body.trim()) {
            Ok(value) => vec![value],
            Err(_) => parse_objects(fence.body),
        })
        .collect();
    interpret_all(&values)
}

/// ```` ```json ```` or ```` ```tool_call ```` fenced blocks.
pub struct StrictBlock;

impl CallExtractor for StrictBlock {
    fn name(&self) -> &'static str {
        "strict_block"
    }

    fn extract(&self, text: &str) -> Option<Extraction> {
        let labelled: Vec<Fence<'_>> = fences(text)
            .into_iter()
            .filter(|fence| {
                CALL_LABELS
                    .iter()
                    .any(|label| fence.label.eq_ignore_ascii_case(label))
            })
            .collect();
        extract_from(labelled)
    }
}

/// Fenced blocks without a language label.
pub struct UnlabeledBlock;

impl CallExtractor for UnlabeledBlock {
    fn name(&self) -> &'static str {
        "unlabeled_block"
    }

    fn extract(&self, text: &str) -> Option<Extraction> {
        let bare: Vec<Fence<'_>> = fences(text)
            .into_iter()
            .filter(|fence| fence.label.is_empty())
            .collect();
        extract_from(bare)
    }
}
