use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub calls: u32,
    pub errors: u32,
}

impl ToolUsage {
    pub fn error_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            f64::from(self.errors) / f64::from(self.calls)
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            1.0 - self.error_rate()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSnippet {
    pub text: String,
    pub count: u32,
}

/// Aggregated outcomes for one scope.
///
/// `success_count + failure_count == total_tasks` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStat {
    pub scope_id: String,
    pub total_tasks: u32,
    pub success_count: u32,
    pub failure_count: u32,
    #[serde(default)]
    pub tool_usage: BTreeMap<String, ToolUsage>,
    pub total_turns: u64,
    pub total_duration_ms: u64,
    /// Most recent first, deduplicated, at most five.
    #[serde(default)]
    pub recent_errors: Vec<ErrorSnippet>,
    pub last_updated: DateTime<Utc>,
}

impl PerformanceStat {
    pub fn new(scope_id: impl Into<String>) -> Self {
        Self {
            scope_id: scope_id.into(),
            total_tasks: 0,
            success_count: 0,
            failure_count: 0,
            tool_usage: BTreeMap::new(),
            total_turns: 0,
            total_duration_ms: 0,
            recent_errors: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            f64::from(self.success_count) / f64::from(self.total_tasks)
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            f64::from(self.failure_count) / f64::from(self.total_tasks)
        }
    }

    pub fn average_turns(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.total_turns as f64 / f64::from(self.total_tasks)
        }
    }

    pub fn average_duration_ms(&self) -> u64 {
        if self.total_tasks == 0 {
            0
        } else {
            self.total_duration_ms / u64::from(self.total_tasks)
        }
    }
}
