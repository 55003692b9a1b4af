use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::info;

use crate::infrastructure::store::JsonFile;
use crate::text;

const GAP_PATTERNS: &[&str] = &[
    "unknown tool",
    "tool not found",
    "no such tool",
    "unrecognized tool",
    "method not found",
    "not supported",
    "unsupported",
    "not implemented",
    "capability not available",
    "未知工具",
    "不支持",
];

const DEDUP_WINDOW_HOURS: i64 = 24;
const MAX_DISCLOSED: usize = 8;

/// True when `error` says the tool or capability does not exist.
pub fn is_gap_error(error: &str) -> bool {
    let lowered = error.to_lowercase();
    GAP_PATTERNS.iter().any(|pattern| lowered.contains(pattern))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityGap {
    pub tool: String,
    pub error: String,
    pub first_seen: DateTime<Utc>,
    pub last_recorded: DateTime<Utc>,
    pub occurrences: u32,
}

/// Tools the agent found missing or unsupported, persisted to
/// `capability_gaps.json` and disclosed in later system prompts.
pub struct CapabilityGapLog {
    gaps: RwLock<Vec<CapabilityGap>>,
    file: JsonFile,
}

impl CapabilityGapLog {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let file = JsonFile::new(path);
        let gaps: Vec<CapabilityGap> = file.load_or_default();
        Self {
            gaps: RwLock::new(gaps),
            file,
        }
    }

    pub fn record(&self, tool: &str, error: &str) -> bool {
        self.record_at(tool, error, Utc::now())
    }

    /// Records a gap unless the same tool was recorded within the last 24
    /// hours. Returns whether a new record was written.
    pub fn record_at(&self, tool: &str, error: &str, now: DateTime<Utc>) -> bool {
        let Ok(mut gaps) = self.gaps.write() else {
            return false;
        };
        let error = text::truncate(error.trim(), 200);
        match gaps.iter_mut().find(|gap| gap.tool == tool) {
            Some(gap) if now - gap.last_recorded < Duration::hours(DEDUP_WINDOW_HOURS) => {
                return false;
            }
            Some(gap) => {
                gap.error = error;
                gap.last_recorded = now;
                gap.occurrences += 1;
            }
            None => gaps.push(CapabilityGap {
                tool: tool.to_string(),
                error,
                first_seen: now,
                last_recorded: now,
                occurrences: 1,
            }),
        }
        info!(tool, "Capability gap recorded");
        self.file.save_detached(&*gaps);
        true
    }

    pub fn all(&self) -> Vec<CapabilityGap> {
        self.gaps.read().map(|gaps| gaps.clone()).unwrap_or_default()
    }

    /// Prompt section listing the most recent gaps.
    pub fn disclosure(&self) -> Option<String> {
        let mut gaps = self.all();
        if gaps.is_empty() {
            return None;
        }
        gaps.sort_by(|a, b| b.last_recorded.cmp(&a.last_recorded));
        let lines: Vec<String> = gaps
            .iter()
            .take(MAX_DISCLOSED)
            .map(|gap| format!("- `{}`: {}", gap.tool, gap.error))
            .collect();
        Some(format!(
            "## Known limitations\nThese capabilities failed recently. Do not rely on them; tell the user when a request needs one.\n{}",
            lines.join("\n")
        ))
    }
}
