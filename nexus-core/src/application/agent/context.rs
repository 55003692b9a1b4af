use std::path::Path;
use std::sync::Arc;

use super::gaps::CapabilityGapLog;
use super::parser::CallParser;
use crate::application::approval::{ApprovalGate, AutoApprove};
use crate::application::memory::MemoryService;
use crate::application::performance::PerformanceTracker;
use crate::application::rules::RuleEngine;
use crate::application::validation::CompletionValidator;
use crate::config::{AgentConfig, RuleConfig};
use crate::domain::{Scope, ToolDescriptor};
use crate::infrastructure::model::ModelGateway;
use crate::infrastructure::tooling::{RetryPolicy, ToolGateway};

pub const STATS_FILE: &str = "nexus_stats.json";
pub const RULES_FILE: &str = "nexus_rules.json";
pub const GAPS_FILE: &str = "capability_gaps.json";

/// Shared services one `ExecutionLoop` runs against. Cheap to clone; the
/// `Orchestrator` owns the long-lived instances.
#[derive(Clone)]
pub struct AgentContext {
    pub config: AgentConfig,
    pub retry: RetryPolicy,
    pub model: Arc<dyn ModelGateway>,
    pub tools: Arc<dyn ToolGateway>,
    pub catalog: Arc<Vec<ToolDescriptor>>,
    pub scopes: Arc<Vec<Scope>>,
    pub tracker: Arc<PerformanceTracker>,
    pub rules: Arc<RuleEngine>,
    pub memory: Arc<MemoryService>,
    pub gaps: Arc<CapabilityGapLog>,
    pub approval: Arc<dyn ApprovalGate>,
    pub parser: Arc<CallParser>,
}

impl AgentContext {
    /// Context with default settings whose stats, rules and gap files live
    /// under `data_dir`.
    pub fn new(
        model: Arc<dyn ModelGateway>,
        tools: Arc<dyn ToolGateway>,
        memory: Arc<MemoryService>,
        data_dir: &Path,
    ) -> Self {
        Self {
            config: AgentConfig::default(),
            retry: RetryPolicy::default(),
            model,
            tools,
            catalog: Arc::new(Vec::new()),
            scopes: Arc::new(Vec::new()),
            tracker: Arc::new(PerformanceTracker::load(data_dir.join(STATS_FILE))),
            rules: Arc::new(RuleEngine::load(data_dir.join(RULES_FILE), RuleConfig::default())),
            memory,
            gaps: Arc::new(CapabilityGapLog::load(data_dir.join(GAPS_FILE))),
            approval: Arc::new(AutoApprove),
            parser: Arc::new(CallParser::default()),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_catalog(mut self, catalog: Vec<ToolDescriptor>) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<Scope>) -> Self {
        self.scopes = Arc::new(scopes);
        self
    }

    pub fn with_approval(mut self, approval: Arc<dyn ApprovalGate>) -> Self {
        self.approval = approval;
        self
    }

    pub fn with_rules(mut self, rules: Arc<RuleEngine>) -> Self {
        self.rules = rules;
        self
    }

    pub fn validator(&self) -> CompletionValidator {
        CompletionValidator::new(Arc::clone(&self.model), self.config.model_timeout)
    }
}
