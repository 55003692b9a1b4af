use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::debug;

use crate::domain::{ErrorSnippet, ExecutionTrace, PerformanceStat};
use crate::infrastructure::store::JsonFile;
use crate::text;

pub const MAX_ERROR_SNIPPETS: usize = 5;
const SNIPPET_CHARS: usize = 80;

/// Aggregates sealed traces into per-scope `PerformanceStat`s.
///
/// State lives in memory; every update is written to `nexus_stats.json` in
/// the background.
pub struct PerformanceTracker {
    stats: RwLock<BTreeMap<String, PerformanceStat>>,
    file: JsonFile,
}

impl PerformanceTracker {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let file = JsonFile::new(path);
        let stats: BTreeMap<String, PerformanceStat> = file.load_or_default();
        debug!(scopes = stats.len(), "Loaded performance stats");
        Self {
            stats: RwLock::new(stats),
            file,
        }
    }

    /// Folds `trace` into its scope's stats and returns the updated snapshot.
    /// Traces without a scope are not tracked.
    pub fn record(&self, trace: &ExecutionTrace) -> Option<PerformanceStat> {
        let scope_id = trace.scope_id.as_deref()?;
        let (updated, all) = {
            let mut stats = self.stats.write().ok()?;
            let stat = stats
                .entry(scope_id.to_string())
                .or_insert_with(|| PerformanceStat::new(scope_id));
            apply(stat, trace);
            (stat.clone(), stats.clone())
        };
        self.file.save_detached(&all);
        Some(updated)
    }

    pub fn snapshot(&self, scope_id: &str) -> Option<PerformanceStat> {
        self.stats.read().ok()?.get(scope_id).cloned()
    }

    pub fn all(&self) -> Vec<PerformanceStat> {
        self.stats
            .read()
            .map(|stats| stats.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn insight_block(&self, scope_id: &str) -> Option<String> {
        self.snapshot(scope_id)
            .and_then(|stat| super::insight::render_insight(&stat))
    }
}

fn apply(stat: &mut PerformanceStat, trace: &ExecutionTrace) {
    stat.total_tasks += 1;
    if trace.success {
        stat.success_count += 1;
    } else {
        stat.failure_count += 1;
    }
    stat.total_turns += u64::from(trace.turns);
    stat.total_duration_ms += trace.duration_ms;

    for outcome in &trace.outcomes {
        let usage = stat.tool_usage.entry(outcome.name.clone()).or_default();
        usage.calls += 1;
        if !outcome.succeeded() {
            usage.errors += 1;
            remember_error(
                &mut stat.recent_errors,
                format!("{}: {}", outcome.name, text::truncate(outcome.result.trim(), SNIPPET_CHARS)),
            );
        }
    }
    stat.last_updated = Utc::now();
}

/// Most recent first; a repeated snippet moves to the front with its count
/// bumped.
fn remember_error(recent: &mut Vec<ErrorSnippet>, snippet: String) {
    let count = match recent.iter().position(|existing| existing.text == snippet) {
        Some(index) => recent.remove(index).count + 1,
        None => 1,
    };
    recent.insert(0, ErrorSnippet { text: snippet, count });
    recent.truncate(MAX_ERROR_SNIPPETS);
}
