use serde_json::Value;
use std::collections::HashMap;

use crate::text;

const SIGNATURE_CHARS: usize = 120;
/// Identical failures of the same call allowed before further attempts are
/// refused.
pub const MAX_IDENTICAL_FAILURES: u32 = 2;

/// Per-task memory of tool failures.
#[derive(Debug, Default)]
pub struct ReflexionTracker {
    signatures: HashMap<String, u32>,
    failed_calls: HashMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    /// How often this error signature has now been seen.
    pub occurrences: u32,
    pub instruction: String,
}

impl ReflexionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when this exact call already failed `MAX_IDENTICAL_FAILURES` times.
    pub fn should_refuse(&self, tool: &str, arguments: &Value) -> bool {
        self.failed_calls
            .get(&call_key(tool, arguments))
            .is_some_and(|count| *count >= MAX_IDENTICAL_FAILURES)
    }

    pub fn record_failure(&mut self, tool: &str, arguments: &Value, result: &str) -> Reflection {
        *self.failed_calls.entry(call_key(tool, arguments)).or_default() += 1;
        let occurrences = {
            let count = self.signatures.entry(signature(tool, result)).or_default();
            *count += 1;
            *count
        };
        let instruction = if occurrences >= 2 {
            format!(
                "`{tool}` failed again with the same error ({occurrences} times). Do not repeat this call. \
Change strategy: use different arguments, a different tool, or explain what is blocking you."
            )
        } else {
            format!(
                "Before the next action, reflect briefly on this failure of `{tool}`:\n\
1. Root cause: why did it fail?\n\
2. Fix: what will you change in the next call?\n\
3. Prevention: how will you avoid this class of error from now on?"
            )
        };
        Reflection {
            occurrences,
            instruction,
        }
    }

    pub fn record_success(&mut self, tool: &str, arguments: &Value) {
        self.failed_calls.remove(&call_key(tool, arguments));
    }
}

pub fn refusal_message(tool: &str) -> String {
    format!(
        "Refused: `{tool}` with these exact arguments has already failed {MAX_IDENTICAL_FAILURES} times. \
It was not executed. Choose a different approach."
    )
}

fn signature(tool: &str, result: &str) -> String {
    format!("{tool}|{}", text::truncate(result.trim(), SIGNATURE_CHARS))
}

fn call_key(tool: &str, arguments: &Value) -> String {
    format!("{tool}|{arguments}")
}
