use chrono::{Local, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use std::sync::{LazyLock, Mutex};

use super::error::MemoryError;
use crate::domain::{Fact, SopRecord};
use crate::infrastructure::store;
use crate::text;

pub const SOP_MARKER: &str = "#SOP";
pub const SOP_TAG: &str = "sop";

/// `- [id] (timestamp) [tag, tag] text`
static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^- \[([0-9A-Za-z-]+)\] \(([^)]*)\)(?: \[([^\]]*)\])? (.*)$").expect("valid regex")
});

static SOP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"#SOP task: "(.*)" steps: (.*)$"#).expect("valid regex")
});

const STEP_SEPARATOR: &str = " → ";

/// Durable facts and SOPs kept in `MEMORY.md`.
pub struct FactStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn add(&self, text: &str, tags: &[String]) -> Result<Fact, MemoryError> {
        let now = Local::now();
        let text = text.replace(['\r', '\n'], " ").trim().to_string();
        let fact = Fact {
            id: entry_id(&now.to_rfc3339(), &text),
            text,
            tags: tags.to_vec(),
            timestamp: Some(now.format("%Y-%m-%d %H:%M").to_string()),
        };
        let _guard = self.write_lock.lock();
        store::append_line(&self.path, &render(&fact))?;
        Ok(fact)
    }

    pub fn all(&self) -> Result<Vec<Fact>, MemoryError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(MemoryError::io(&self.path, err)),
        };
        Ok(raw.lines().filter_map(parse).collect())
    }

    /// Facts ranked by relevance to `query`: a whole-query substring hit
    /// outweighs token overlap, and SOP entries get a small bonus.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Fact>, MemoryError> {
        let needle = query.trim().to_lowercase();
        let query_tokens = text::tokens(query);
        let mut scored: Vec<(usize, Fact)> = self
            .all()?
            .into_iter()
            .filter_map(|fact| {
                let haystack = fact.text.to_lowercase();
                let mut score = text::overlap(&query_tokens, &text::tokens(&fact.text));
                if !needle.is_empty() && haystack.contains(&needle) {
                    score += 10;
                }
                if score == 0 {
                    return None;
                }
                if is_sop(&fact) {
                    score += 2;
                }
                Some((score, fact))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(limit).map(|(_, fact)| fact).collect())
    }

    pub fn record_sop(&self, task: &str, steps: &[String]) -> Result<SopRecord, MemoryError> {
        let task = task.replace('"', "'");
        let line = format!(
            "{SOP_MARKER} task: \"{}\" steps: {}",
            text::truncate(&task, 120),
            steps.join(STEP_SEPARATOR)
        );
        self.add(&line, &[SOP_TAG.to_string()])?;
        Ok(SopRecord {
            task,
            steps: steps.to_vec(),
            timestamp: Utc::now(),
        })
    }

    /// Up to two SOPs whose task shares the most tokens with `query`.
    pub fn find_sops(&self, query: &str) -> Result<Vec<SopRecord>, MemoryError> {
        let query_tokens = text::tokens(query);
        let mut scored: Vec<(usize, SopRecord)> = self
            .all()?
            .iter()
            .filter_map(parse_sop)
            .filter_map(|sop| {
                let score = text::overlap(&query_tokens, &text::tokens(&sop.task));
                (score > 0).then_some((score, sop))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(2).map(|(_, sop)| sop).collect())
    }
}

fn entry_id(stamp: &str, text: &str) -> String {
    let prefix: String = text.chars().take(100).collect();
    let digest = Sha256::digest(format!("{stamp}:{prefix}").as_bytes());
    hex::encode(digest)[..12].to_string()
}

fn render(fact: &Fact) -> String {
    let stamp = fact.timestamp.as_deref().unwrap_or("");
    if fact.tags.is_empty() {
        format!("- [{}] ({stamp}) {}", fact.id, fact.text)
    } else {
        format!("- [{}] ({stamp}) [{}] {}", fact.id, fact.tags.join(", "), fact.text)
    }
}

fn parse(line: &str) -> Option<Fact> {
    let caps = ENTRY_RE.captures(line.trim_end())?;
    let tags = caps
        .get(3)
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let timestamp = caps.get(2).map(|m| m.as_str().to_string()).filter(|s| !s.is_empty());
    Some(Fact {
        id: caps[1].to_string(),
        text: caps[4].to_string(),
        tags,
        timestamp,
    })
}

fn is_sop(fact: &Fact) -> bool {
    fact.text.starts_with(SOP_MARKER) || fact.tags.iter().any(|tag| tag == SOP_TAG)
}

fn parse_sop(fact: &Fact) -> Option<SopRecord> {
    let caps = SOP_RE.captures(&fact.text)?;
    let steps = caps[2]
        .split(STEP_SEPARATOR)
        .map(|step| step.trim().to_string())
        .filter(|step| !step.is_empty())
        .collect();
    let timestamp = fact
        .timestamp
        .as_deref()
        .and_then(|stamp| chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M").ok())
        .map(|naive| naive.and_utc())
        .unwrap_or_else(Utc::now);
    Some(SopRecord {
        task: caps[1].to_string(),
        steps,
        timestamp,
    })
}
