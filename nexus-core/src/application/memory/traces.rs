use std::fs;
use std::path::PathBuf;
use tracing::debug;

use super::error::MemoryError;
use crate::domain::ExecutionTrace;
use crate::infrastructure::store;
use crate::text;

/// Monthly JSONL archive of sealed execution traces.
pub struct TraceStore {
    dir: PathBuf,
}

impl TraceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn month_file(&self, trace: &ExecutionTrace) -> PathBuf {
        self.dir
            .join(format!("{}.jsonl", trace.recorded_at.format("%Y-%m")))
    }

    /// Appends the trace in the background.
    pub fn archive(&self, trace: &ExecutionTrace) -> Option<tokio::task::JoinHandle<()>> {
        match serde_json::to_string(trace) {
            Ok(line) => store::append_line_detached(self.month_file(trace), line),
            Err(err) => {
                tracing::warn!(trace_id = %trace.id, error = %err, "Failed to encode trace");
                None
            }
        }
    }

    /// Traces whose task text or tags share a token with `query`, newest
    /// first.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<ExecutionTrace>, MemoryError> {
        let query_tokens = text::tokens(query);
        if query_tokens.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let mut files = match fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
                .collect::<Vec<_>>(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(MemoryError::io(&self.dir, err)),
        };
        files.sort();
        files.reverse();

        let mut found = Vec::new();
        for path in files {
            let raw = fs::read_to_string(&path).map_err(|err| MemoryError::io(&path, err))?;
            for line in raw.lines().rev() {
                let trace: ExecutionTrace = match serde_json::from_str(line) {
                    Ok(trace) => trace,
                    Err(err) => {
                        debug!(path = %path.display(), error = %err, "Skipping malformed trace line");
                        continue;
                    }
                };
                let mut candidate = text::tokens(&trace.task);
                candidate.extend(trace.tags.iter().cloned());
                if text::overlap(&query_tokens, &candidate) > 0 {
                    found.push(trace);
                    if found.len() == limit {
                        return Ok(found);
                    }
                }
            }
        }
        Ok(found)
    }
}
