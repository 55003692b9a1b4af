use serde_json::Value;

use crate::config::AgentConfig;
use crate::text;

/// Flags high-risk tool calls whose arguments contain a dangerous pattern.
#[derive(Debug, Clone)]
pub struct RiskGate {
    high_risk_tools: Vec<String>,
    danger_patterns: Vec<String>,
}

impl RiskGate {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            high_risk_tools: config.high_risk_tools.clone(),
            danger_patterns: config
                .danger_patterns
                .iter()
                .map(|pattern| pattern.to_lowercase())
                .collect(),
        }
    }

    /// The matched pattern when `tool` is high-risk and its arguments
    /// contain one.
    pub fn check(&self, tool: &str, arguments: &Value) -> Option<&str> {
        if !self
            .high_risk_tools
            .iter()
            .any(|risky| risky.eq_ignore_ascii_case(tool))
        {
            return None;
        }
        let haystack = flatten(arguments).to_lowercase();
        self.danger_patterns
            .iter()
            .find(|pattern| haystack.contains(pattern.as_str()))
            .map(String::as_str)
    }
}

fn flatten(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(flatten).collect::<Vec<_>>().join(" "),
        Value::Object(map) => map.values().map(flatten).collect::<Vec<_>>().join(" "),
        other => other.to_string(),
    }
}

/// Whole name fragments that mark a tool as read-only even if it touches
/// files.
const READ_ONLY_MARKERS: &[&str] = &["read", "list", "get", "search", "view", "stat", "find"];

/// True for tools that change state and deserve a verification pass.
pub fn is_mutating(tool: &str, markers: &[String]) -> bool {
    let fragments = text::name_fragments(tool);
    if fragments
        .iter()
        .any(|fragment| READ_ONLY_MARKERS.contains(&fragment.as_str()))
    {
        return false;
    }
    let lowered = tool.to_lowercase();
    markers.iter().any(|marker| lowered.contains(marker.as_str()))
}

pub fn verification_instruction(tool: &str) -> String {
    format!(
        "`{tool}` changed something. Before concluding, verify the change took effect (read it back or inspect the output) and confirm it satisfies the request."
    )
}
