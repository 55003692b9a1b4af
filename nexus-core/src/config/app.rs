use super::defaults;
use super::error::ConfigError;
use crate::domain::{Scope, SkillEntry, ToolDescriptor};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the loop talks to the model about tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolMode {
    /// Tool calls are embedded as JSON in the response text.
    #[default]
    Text,
    /// The gateway returns function-call descriptors directly.
    Native,
}

impl ProtocolMode {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "text" => Ok(ProtocolMode::Text),
            "native" | "function" | "function_call" => Ok(ProtocolMode::Native),
            other => Err(ConfigError::UnknownProtocol(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub simple_turns: u32,
    pub normal_turns: u32,
    pub heavy_turns: u32,
    pub escalation_turns: u32,
    pub max_escalations: u32,
    pub escalation_skip_threshold: u8,
    pub protocol: ProtocolMode,
    pub high_risk_tools: Vec<String>,
    pub danger_patterns: Vec<String>,
    pub mutating_tool_markers: Vec<String>,
    pub model_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            simple_turns: defaults::SIMPLE_TURNS,
            normal_turns: defaults::NORMAL_TURNS,
            heavy_turns: defaults::HEAVY_TURNS,
            escalation_turns: defaults::ESCALATION_TURNS,
            max_escalations: defaults::MAX_ESCALATIONS,
            escalation_skip_threshold: defaults::ESCALATION_SKIP_THRESHOLD,
            protocol: ProtocolMode::Text,
            high_risk_tools: to_strings(defaults::HIGH_RISK_TOOLS),
            danger_patterns: to_strings(defaults::DANGER_PATTERNS),
            mutating_tool_markers: to_strings(defaults::MUTATING_TOOL_MARKERS),
            model_timeout: Duration::from_secs(defaults::MODEL_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolGatewayConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for ToolGatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::TOOL_GATEWAY_ENDPOINT.to_string(),
            timeout: Duration::from_secs(defaults::TOOL_TIMEOUT_SECS),
            max_retries: defaults::TOOL_MAX_RETRIES,
            base_delay: Duration::from_millis(defaults::TOOL_BASE_DELAY_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
    pub api_path: String,
    /// Embedding model for the skill index; keyword matching is used when unset.
    pub embedding_model: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::MODEL_ENDPOINT.to_string(),
            model: defaults::MODEL_NAME.to_string(),
            api_key_env: None,
            api_path: defaults::MODEL_API_PATH.to_string(),
            embedding_model: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleConfig {
    pub min_samples: u32,
    pub max_active: usize,
    pub expiry: chrono::Duration,
    pub cooldown: chrono::Duration,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            min_samples: defaults::RULE_MIN_SAMPLES,
            max_active: defaults::RULE_MAX_ACTIVE,
            expiry: chrono::Duration::days(defaults::RULE_EXPIRY_DAYS),
            cooldown: chrono::Duration::hours(defaults::RULE_COOLDOWN_HOURS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub max_parallel: usize,
    pub max_retries: u32,
    pub min_subtasks: usize,
    pub max_subtasks: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_parallel: defaults::PLANNER_MAX_PARALLEL,
            max_retries: defaults::PLANNER_MAX_RETRIES,
            min_subtasks: defaults::PLANNER_MIN_SUBTASKS,
            max_subtasks: defaults::PLANNER_MAX_SUBTASKS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub data_dir: PathBuf,
    pub consolidate_every: usize,
    pub skill_threshold: f32,
}

impl MemoryConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: expand_path(defaults::MEMORY_DATA_DIR),
            consolidate_every: defaults::CONSOLIDATE_EVERY,
            skill_threshold: defaults::SKILL_THRESHOLD,
        }
    }
}

/// Application configuration loaded from nexus.toml
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub tool_gateway: ToolGatewayConfig,
    pub model: ModelConfig,
    pub rules: RuleConfig,
    pub planner: PlannerConfig,
    pub memory: MemoryConfig,
    pub tools: Vec<ToolDescriptor>,
    pub skills: Vec<SkillEntry>,
    pub scopes_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from a file path (or default path if None)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_config(path)
    }

    /// Reads the externally owned scope definitions, if a path is configured.
    pub fn load_scopes(&self) -> Result<Vec<Scope>, ConfigError> {
        let Some(path) = self.scopes_path.as_deref() else {
            return Ok(Vec::new());
        };
        super::loader::load_scopes(path)
    }
}

pub(super) fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
