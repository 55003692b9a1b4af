use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Action,
    Thought,
    Result,
}

impl LogCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            LogCategory::Action => "action",
            LogCategory::Thought => "thought",
            LogCategory::Result => "result",
        }
    }
}

/// One line of the ephemeral day log.
#[derive(Debug, Clone, PartialEq)]
pub struct DayLogEntry {
    pub timestamp: DateTime<Local>,
    pub category: LogCategory,
    pub text: String,
}

/// A durable fact from `MEMORY.md`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub id: String,
    pub text: String,
    pub tags: Vec<String>,
    pub timestamp: Option<String>,
}

/// A reusable step sequence that completed a similar task before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SopRecord {
    pub task: String,
    pub steps: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Catalog entry for a skill before embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    pub path: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl SkillEntry {
    pub fn embedding_text(&self) -> String {
        if self.keywords.is_empty() {
            self.description.clone()
        } else {
            format!("{} {}", self.description, self.keywords.join(" "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillVector {
    pub name: String,
    pub path: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub embedding: Vec<f32>,
    pub checksum: String,
}
