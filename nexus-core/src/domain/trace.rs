use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use uuid::Uuid;

use super::tool::{ToolOutcome, ToolStatus};

/// Sealed record of one task run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub id: String,
    pub task: String,
    pub outcomes: Vec<ToolOutcome>,
    pub success: bool,
    pub turns: u32,
    pub errors: u32,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ExecutionTrace {
    /// Tool names in call order, joined for display.
    pub fn tool_sequence(&self) -> String {
        self.outcomes
            .iter()
            .map(|outcome| outcome.name.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }
}

/// Accumulates outcomes while a loop is running.
#[derive(Debug)]
pub struct TraceBuilder {
    task: String,
    scope_id: Option<String>,
    outcomes: Vec<ToolOutcome>,
    turns: u32,
    started: Instant,
}

impl TraceBuilder {
    pub fn new(task: impl Into<String>, scope_id: Option<String>) -> Self {
        Self {
            task: task.into(),
            scope_id,
            outcomes: Vec::new(),
            turns: 0,
            started: Instant::now(),
        }
    }

    pub fn record(
        &mut self,
        name: impl Into<String>,
        arguments: Value,
        status: ToolStatus,
        result: impl Into<String>,
        latency_ms: u64,
    ) -> &ToolOutcome {
        let order = self.outcomes.len();
        self.outcomes.push(ToolOutcome {
            name: name.into(),
            arguments,
            status,
            result: result.into(),
            latency_ms,
            order,
        });
        &self.outcomes[order]
    }

    pub fn set_turns(&mut self, turns: u32) {
        self.turns = turns;
    }

    pub fn outcomes(&self) -> &[ToolOutcome] {
        &self.outcomes
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn scope_id(&self) -> Option<&str> {
        self.scope_id.as_deref()
    }

    /// Snapshot of the trace so far without consuming the builder.
    pub fn snapshot(&self) -> ExecutionTrace {
        let errors = self.outcomes.iter().filter(|o| !o.succeeded()).count() as u32;
        ExecutionTrace {
            id: Uuid::new_v4().to_string(),
            task: self.task.clone(),
            outcomes: self.outcomes.clone(),
            success: errors == 0,
            turns: self.turns,
            errors,
            duration_ms: self.started.elapsed().as_millis() as u64,
            scope_id: self.scope_id.clone(),
            recorded_at: Utc::now(),
            tags: keyword_tags(&self.task),
        }
    }

    pub fn seal(self) -> ExecutionTrace {
        self.snapshot()
    }
}

/// Up to eight distinct lowercase keywords from the task text, used for
/// archive lookups.
fn keyword_tags(task: &str) -> Vec<String> {
    let mut tags = Vec::new();
    for token in crate::text::tokens(task) {
        if token.chars().count() < 2 || tags.contains(&token) {
            continue;
        }
        tags.push(token);
        if tags.len() == 8 {
            break;
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sealed_trace_counts_errors_and_orders_outcomes() {
        let mut builder = TraceBuilder::new("read the config file", Some("files".into()));
        builder.record("readFile", json!({"path": "a"}), ToolStatus::Success, "ok", 3);
        builder.record("readFile", json!({"path": "b"}), ToolStatus::Error, "missing", 2);
        builder.set_turns(2);

        let trace = builder.seal();

        assert!(!trace.success);
        assert_eq!(trace.errors, 1);
        assert_eq!(trace.turns, 2);
        assert_eq!(trace.outcomes[1].order, 1);
        assert_eq!(trace.scope_id.as_deref(), Some("files"));
        assert!(trace.tags.contains(&"config".to_string()));
    }

    #[test]
    fn empty_trace_is_successful() {
        let trace = TraceBuilder::new("hi", None).seal();
        assert!(trace.success);
        assert_eq!(trace.success_count(), 0);
    }
}
