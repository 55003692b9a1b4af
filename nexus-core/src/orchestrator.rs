//! Owns the long-lived services and hands each task a fresh
//! `ExecutionLoop`.

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{info, warn};

use crate::application::agent::{
    AgentContext, AgentOutcome, CallParser, CapabilityGapLog, ExecutionLoop, GAPS_FILE, RULES_FILE,
    RunOptions, STATS_FILE,
};
use crate::application::approval::{ApprovalGate, AutoApprove};
use crate::application::memory::MemoryService;
use crate::application::performance::PerformanceTracker;
use crate::application::planner::{DagExecutor, TaskPlanner};
use crate::application::rules::RuleEngine;
use crate::config::{AppConfig, ConfigError};
use crate::domain::{Scope, TaskPlan, ToolDescriptor};
use crate::infrastructure::model::{EmbeddingGateway, ModelGateway};
use crate::infrastructure::store::TtlCache;
use crate::infrastructure::tooling::{RetryPolicy, ToolGateway};

const SCOPES_KEY: &str = "scopes";
const SCOPES_TTL: Duration = Duration::from_secs(60);

pub struct Orchestrator {
    config: AppConfig,
    model: Arc<dyn ModelGateway>,
    tools: Arc<dyn ToolGateway>,
    catalog: RwLock<Arc<Vec<ToolDescriptor>>>,
    scopes: TtlCache<Arc<Vec<Scope>>>,
    pinned: RwLock<Option<String>>,
    tracker: Arc<PerformanceTracker>,
    rules: Arc<RuleEngine>,
    memory: Arc<MemoryService>,
    gaps: Arc<CapabilityGapLog>,
    approval: Arc<dyn ApprovalGate>,
    parser: Arc<CallParser>,
}

impl Orchestrator {
    pub fn new(config: AppConfig, model: Arc<dyn ModelGateway>, tools: Arc<dyn ToolGateway>) -> Self {
        let data_dir = config.memory.data_dir.clone();
        let memory = MemoryService::new(&config.memory, config.skills.clone()).with_model(Arc::clone(&model));
        Self {
            catalog: RwLock::new(Arc::new(config.tools.clone())),
            scopes: TtlCache::new(),
            pinned: RwLock::new(None),
            tracker: Arc::new(PerformanceTracker::load(data_dir.join(STATS_FILE))),
            rules: Arc::new(RuleEngine::load(data_dir.join(RULES_FILE), config.rules.clone())),
            memory: Arc::new(memory),
            gaps: Arc::new(CapabilityGapLog::load(data_dir.join(GAPS_FILE))),
            approval: Arc::new(AutoApprove),
            parser: Arc::new(CallParser::default()),
            config,
            model,
            tools,
        }
    }

    /// Enables semantic skill lookup. Call before the first run.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingGateway>) -> Self {
        let memory = MemoryService::new(&self.config.memory, self.config.skills.clone())
            .with_model(Arc::clone(&self.model))
            .with_embedder(embedder);
        self.memory = Arc::new(memory);
        self
    }

    pub fn with_approval(mut self, approval: Arc<dyn ApprovalGate>) -> Self {
        self.approval = approval;
        self
    }

    pub fn with_parser(mut self, parser: CallParser) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    pub async fn run(&self, task: &str) -> AgentOutcome {
        self.run_with(task, RunOptions::default()).await
    }

    pub async fn run_with(&self, task: &str, mut options: RunOptions) -> AgentOutcome {
        if options.pinned_scope.is_none() {
            options.pinned_scope = self.pinned_scope();
        }
        let ctx = self.context().await;
        ExecutionLoop::new(ctx).run(task, options).await
    }

    pub async fn plan(&self, request: &str) -> TaskPlan {
        TaskPlanner::new(
            Arc::clone(&self.model),
            self.config.planner.clone(),
            self.config.agent.model_timeout,
        )
        .plan(request)
        .await
    }

    /// Runs every sub-task through its own execution loop and returns the
    /// plan summary.
    pub async fn execute_plan(&self, plan: &mut TaskPlan) -> String {
        let runner = Arc::new(ExecutionLoop::new(self.context().await));
        DagExecutor::new(runner, Arc::clone(&self.approval), self.config.planner.max_parallel)
            .execute(plan)
            .await
    }

    /// Replaces the tool catalog for subsequent runs.
    pub fn reload_tools(&self, catalog: Vec<ToolDescriptor>) {
        let count = catalog.len();
        match self.catalog.write() {
            Ok(mut current) => *current = Arc::new(catalog),
            Err(_) => {
                warn!("Tool catalog lock poisoned, keeping the old catalog");
                return;
            }
        }
        info!(tools = count, "Tool catalog reloaded");
    }

    pub fn pin_scope(&self, scope_id: Option<String>) {
        if let Ok(mut pinned) = self.pinned.write() {
            info!(scope = scope_id.as_deref(), "Active scope pinned");
            *pinned = scope_id;
        }
    }

    pub fn pinned_scope(&self) -> Option<String> {
        self.pinned.read().ok().and_then(|pinned| pinned.clone())
    }

    /// Drops cached scopes so the next run rereads the scope file.
    pub fn invalidate_scopes(&self) {
        self.scopes.invalidate(SCOPES_KEY);
    }

    /// Builds or reloads the skill vector cache.
    pub async fn refresh_skills(&self) -> usize {
        match self.memory.skills().refresh().await {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "Skill index refresh failed");
                0
            }
        }
    }

    pub fn memory(&self) -> &MemoryService {
        &self.memory
    }

    pub fn tracker(&self) -> &PerformanceTracker {
        &self.tracker
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    pub fn gaps(&self) -> &CapabilityGapLog {
        &self.gaps
    }

    async fn scopes(&self) -> Arc<Vec<Scope>> {
        let loaded = self
            .scopes
            .get_or_load(SCOPES_KEY, SCOPES_TTL, || async {
                self.config.load_scopes().map(Arc::new)
            })
            .await;
        loaded.unwrap_or_else(|err: ConfigError| {
            warn!(error = %err, "Failed to load scopes, routing disabled");
            Arc::new(Vec::new())
        })
    }

    fn catalog(&self) -> Arc<Vec<ToolDescriptor>> {
        self.catalog
            .read()
            .map(|catalog| Arc::clone(&catalog))
            .unwrap_or_else(|_| Arc::new(Vec::new()))
    }

    async fn context(&self) -> AgentContext {
        AgentContext {
            config: self.config.agent.clone(),
            retry: RetryPolicy::from(&self.config.tool_gateway),
            model: Arc::clone(&self.model),
            tools: Arc::clone(&self.tools),
            catalog: self.catalog(),
            scopes: self.scopes().await,
            tracker: Arc::clone(&self.tracker),
            rules: Arc::clone(&self.rules),
            memory: Arc::clone(&self.memory),
            gaps: Arc::clone(&self.gaps),
            approval: Arc::clone(&self.approval),
            parser: Arc::clone(&self.parser),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::domain::{ChatMessage, ToolKind};
    use crate::infrastructure::model::ModelError;
    use crate::infrastructure::tooling::{ToolInvokeError, ToolResponse};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    struct EchoModel;

    #[async_trait]
    impl ModelGateway for EchoModel {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
            let system = messages.first().map(|m| m.content.clone()).unwrap_or_default();
            Ok(if system.contains("# Active scope") {
                "scoped".to_string()
            } else {
                "unscoped".to_string()
            })
        }
    }

    struct NoTools;

    #[async_trait]
    impl ToolGateway for NoTools {
        async fn invoke(&self, _name: &str, _args: Value) -> Result<ToolResponse, ToolInvokeError> {
            Ok(ToolResponse::success("ok"))
        }
    }

    fn orchestrator(dir: &TempDir) -> Orchestrator {
        let scopes_path = dir.path().join("scopes.json");
        fs::write(
            &scopes_path,
            r#"[{"id": "mail", "label": "Mail", "triggers": ["send an email"], "tools": ["sendEmail"]}]"#,
        )
        .expect("write scopes");
        let config = AppConfig {
            memory: MemoryConfig::with_data_dir(dir.path()),
            scopes_path: Some(scopes_path),
            ..AppConfig::default()
        };
        Orchestrator::new(config, Arc::new(EchoModel), Arc::new(NoTools))
    }

    #[tokio::test]
    async fn pinned_scope_applies_to_runs() {
        let dir = TempDir::new().expect("tempdir");
        let orchestrator = orchestrator(&dir);

        assert_eq!(orchestrator.run("hello").await.response, "unscoped");
        assert_eq!(orchestrator.run("please send an email").await.response, "scoped");

        orchestrator.pin_scope(Some("mail".into()));
        let outcome = orchestrator.run("hello").await;
        assert_eq!(outcome.response, "scoped");
        assert_eq!(outcome.scope_id.as_deref(), Some("mail"));
    }

    #[tokio::test]
    async fn reloaded_catalog_is_used_by_the_next_run() {
        let dir = TempDir::new().expect("tempdir");
        let orchestrator = orchestrator(&dir);

        orchestrator.reload_tools(vec![ToolDescriptor::new("sendEmail", ToolKind::Plugin, "Send mail")]);

        let ctx = orchestrator.context().await;
        assert_eq!(ctx.catalog.len(), 1);
        assert_eq!(ctx.scopes.len(), 1);
    }
}
