//! Memory subsystem: day log, durable facts and SOPs, trace archive and
//! skill index, all rooted at the configured data directory.

mod consolidate;
mod day_log;
mod error;
mod facts;
mod skills;
mod traces;

pub use consolidate::{CONSOLIDATED_TAG, consolidate};
pub use day_log::DayLog;
pub use error::MemoryError;
pub use facts::{FactStore, SOP_MARKER};
pub use skills::{SkillIndex, SkillMatch, catalog_checksum, cosine};
pub use traces::TraceStore;

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::warn;

use crate::config::MemoryConfig;
use crate::domain::{LogCategory, SkillEntry};
use crate::infrastructure::model::{EmbeddingGateway, ModelGateway};

pub struct MemoryService {
    day_log: DayLog,
    facts: Arc<FactStore>,
    traces: TraceStore,
    skills: SkillIndex,
    model: Option<Arc<dyn ModelGateway>>,
    consolidate_every: usize,
}

impl MemoryService {
    pub fn new(config: &MemoryConfig, skills: Vec<SkillEntry>) -> Self {
        let root = &config.data_dir;
        Self {
            day_log: DayLog::new(root.join("memory")),
            facts: Arc::new(FactStore::new(root.join("MEMORY.md"))),
            traces: TraceStore::new(root.join("memory").join("exec_traces")),
            skills: SkillIndex::new(skills, root.join("skill_vectors.json"), config.skill_threshold),
            model: None,
            consolidate_every: config.consolidate_every,
        }
    }

    /// Model used for background consolidation of the day log.
    pub fn with_model(mut self, model: Arc<dyn ModelGateway>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingGateway>) -> Self {
        self.skills = self.skills.with_embedder(embedder);
        self
    }

    pub fn day_log(&self) -> &DayLog {
        &self.day_log
    }

    pub fn facts(&self) -> &FactStore {
        &self.facts
    }

    pub fn traces(&self) -> &TraceStore {
        &self.traces
    }

    pub fn skills(&self) -> &SkillIndex {
        &self.skills
    }

    /// Appends to today's log. Every `consolidate_every` entries a background
    /// consolidation is started when a model and a runtime are available.
    pub fn log(&self, category: LogCategory, text: &str) {
        let count = self.day_log.append(category, text);
        if self.consolidate_every == 0 || count % self.consolidate_every != 0 {
            return;
        }
        let (Some(model), Ok(handle)) = (self.model.clone(), Handle::try_current()) else {
            return;
        };
        let entries = self.day_log.recent(self.consolidate_every);
        let facts = Arc::clone(&self.facts);
        handle.spawn(async move {
            if let Err(err) = consolidate(model.as_ref(), &facts, &entries).await {
                warn!(error = %err, "Day log consolidation failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatMessage;
    use crate::infrastructure::model::ModelError;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    struct FactModel;

    #[async_trait]
    impl ModelGateway for FactModel {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, ModelError> {
            Ok(r#"["Project builds with cargo", "Tests live under tests/"]"#.to_string())
        }
    }

    #[tokio::test]
    async fn every_nth_entry_triggers_consolidation() {
        let dir = TempDir::new().expect("tempdir");
        let config = MemoryConfig {
            consolidate_every: 3,
            ..MemoryConfig::with_data_dir(dir.path())
        };
        let memory = MemoryService::new(&config, Vec::new()).with_model(Arc::new(FactModel));

        for step in 0..3 {
            memory.log(LogCategory::Action, &format!("step {step}"));
        }

        let mut facts = Vec::new();
        for _ in 0..50 {
            facts = memory.facts().all().expect("read");
            if facts.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(facts.len(), 2);
        assert!(facts.iter().all(|fact| fact.tags == vec![CONSOLIDATED_TAG]));
    }
}
