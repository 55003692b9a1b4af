use chrono::{Local, NaiveDate, NaiveTime, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};
use std::collections::VecDeque;
use std::sync::Mutex;

use super::error::MemoryError;
use crate::domain::{DayLogEntry, LogCategory};
use crate::infrastructure::store;

/// Entries kept in memory for consolidation.
const RECENT_CAPACITY: usize = 256;

/// Append-only `memory/<date>.md` log.
pub struct DayLog {
    dir: PathBuf,
    appended: Mutex<(usize, VecDeque<DayLogEntry>)>,
}

impl DayLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            appended: Mutex::new((0, VecDeque::new())),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.md", date.format("%Y-%m-%d")))
    }

    /// Queues one line for today's file and returns the number of entries
    /// appended by this process so far. The write runs in the background
    /// when a runtime is available.
    pub fn append(&self, category: LogCategory, text: &str) -> usize {
        let now = Local::now();
        let text = text.replace(['\r', '\n'], " ").trim().to_string();
        let line = format!("- [{}] [{}] {}", now.format("%H:%M:%S"), category.as_str(), text);
        store::append_line_detached(self.path_for(now.date_naive()), line);

        let Ok(mut appended) = self.appended.lock() else {
            return 0;
        };
        let (count, recent) = &mut *appended;
        *count += 1;
        if recent.len() == RECENT_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(DayLogEntry {
            timestamp: now,
            category,
            text,
        });
        *count
    }

    /// The last `limit` entries appended by this process, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<DayLogEntry> {
        let Ok(appended) = self.appended.lock() else {
            return Vec::new();
        };
        let recent = &appended.1;
        recent
            .iter()
            .skip(recent.len().saturating_sub(limit))
            .cloned()
            .collect()
    }

    pub fn entries_for(&self, date: NaiveDate) -> Result<Vec<DayLogEntry>, MemoryError> {
        let path = self.path_for(date);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(MemoryError::io(&path, err)),
        };
        Ok(raw.lines().filter_map(|line| parse_line(date, line)).collect())
    }

    pub fn today(&self) -> Result<Vec<DayLogEntry>, MemoryError> {
        self.entries_for(Local::now().date_naive())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn parse_line(date: NaiveDate, line: &str) -> Option<DayLogEntry> {
    let rest = line.strip_prefix("- [")?;
    let (time, rest) = rest.split_once("] [")?;
    let (category, text) = rest.split_once("] ")?;
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S").ok()?;
    let category = match category {
        "action" => LogCategory::Action,
        "thought" => LogCategory::Thought,
        "result" => LogCategory::Result,
        _ => return None,
    };
    let timestamp = Local.from_local_datetime(&date.and_time(time)).earliest()?;
    Some(DayLogEntry {
        timestamp,
        category,
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appended_lines_parse_back_with_categories() {
        let dir = TempDir::new().expect("tempdir");
        let log = DayLog::new(dir.path());

        assert_eq!(log.append(LogCategory::Action, "ran readFile"), 1);
        assert_eq!(log.append(LogCategory::Result, "two\nlines"), 2);

        let entries = log.today().expect("read");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].category, LogCategory::Action);
        assert_eq!(entries[1].text, "two lines");
    }

    #[test]
    fn recent_entries_are_the_latest_appends() {
        let dir = TempDir::new().expect("tempdir");
        let log = DayLog::new(dir.path());
        for step in 0..5 {
            log.append(LogCategory::Thought, &format!("step {step}"));
        }

        let recent = log.recent(2);
        let texts: Vec<&str> = recent.iter().map(|entry| entry.text.as_str()).collect();
        assert_eq!(texts, vec!["step 3", "step 4"]);
        assert_eq!(log.recent(10).len(), 5);
    }

    #[test]
    fn foreign_lines_are_skipped() {
        assert!(parse_line(Local::now().date_naive(), "# heading").is_none());
        assert!(parse_line(Local::now().date_naive(), "- [12:00:00] [mood] x").is_none());
    }
}
