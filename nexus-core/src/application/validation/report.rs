use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::ExecutionTrace;

/// Judgement of whether a run satisfied the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub completed: bool,
    /// 0..=100
    pub completion_rate: u8,
    pub summary: String,
    pub completed_steps: Vec<String>,
    pub pending_steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub next_steps: Vec<String>,
}

/// Model-facing shape; tolerant of float rates and string-or-list steps.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReport {
    completed: bool,
    #[serde(alias = "completion_rate")]
    completion_rate: f64,
    #[serde(default)]
    summary: String,
    #[serde(default, alias = "completed_steps", deserialize_with = "string_or_list")]
    completed_steps: Vec<String>,
    #[serde(default, alias = "pending_steps", deserialize_with = "string_or_list")]
    pending_steps: Vec<String>,
    #[serde(default, alias = "failure_reason")]
    failure_reason: Option<String>,
    #[serde(default, alias = "next_steps", deserialize_with = "string_or_list")]
    next_steps: Vec<String>,
}

impl ValidationReport {
    /// Parses a model reply, clamping the rate into 0..=100.
    pub fn from_json(raw: &str) -> Option<Self> {
        let raw: RawReport = serde_json::from_str(raw).ok()?;
        if !raw.completion_rate.is_finite() {
            return None;
        }
        Some(Self {
            completed: raw.completed,
            completion_rate: raw.completion_rate.clamp(0.0, 100.0).round() as u8,
            summary: raw.summary,
            completed_steps: raw.completed_steps,
            pending_steps: raw.pending_steps,
            failure_reason: raw.failure_reason.filter(|reason| !reason.trim().is_empty()),
            next_steps: raw.next_steps,
        })
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) if text.trim().is_empty() => Vec::new(),
        Value::String(text) => vec![text],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Deterministic judgement from call outcomes alone: 100 when every call
/// succeeded (including no calls), otherwise the share of successful calls.
pub fn heuristic_report(trace: &ExecutionTrace) -> ValidationReport {
    let total = trace.outcomes.len();
    let succeeded = trace.success_count();
    let rate = if succeeded == total {
        100
    } else {
        (succeeded * 100 / total) as u8
    };
    let (completed_steps, pending_steps): (Vec<_>, Vec<_>) =
        trace.outcomes.iter().partition(|outcome| outcome.succeeded());
    ValidationReport {
        completed: rate == 100,
        completion_rate: rate,
        summary: format!("{succeeded} of {total} tool calls succeeded."),
        completed_steps: completed_steps.iter().map(|o| o.name.clone()).collect(),
        pending_steps: pending_steps.iter().map(|o| o.name.clone()).collect(),
        failure_reason: (rate < 100).then(|| "Some tool calls failed.".to_string()),
        next_steps: Vec::new(),
    }
}
