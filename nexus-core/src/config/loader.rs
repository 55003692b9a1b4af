use super::CONFIG_PATH;
use super::app::{
    AgentConfig, AppConfig, MemoryConfig, ModelConfig, PlannerConfig, ProtocolMode, RuleConfig,
    ToolGatewayConfig, expand_path,
};
use super::error::ConfigError;
use crate::domain::{Scope, SkillEntry, ToolDescriptor};
use dotenvy::from_filename;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use tracing::debug;

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure for deserialization from TOML
#[derive(Debug, Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub agent: RawAgent,
    #[serde(default)]
    pub tool_gateway: RawToolGateway,
    #[serde(default)]
    pub model: RawModel,
    #[serde(default)]
    pub rules: RawRules,
    #[serde(default)]
    pub planner: RawPlanner,
    #[serde(default)]
    pub memory: RawMemory,
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub skills: Vec<SkillEntry>,
    pub scopes_path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RawAgent {
    pub simple_turns: Option<u32>,
    pub normal_turns: Option<u32>,
    pub heavy_turns: Option<u32>,
    pub escalation_turns: Option<u32>,
    pub max_escalations: Option<u32>,
    pub escalation_skip_threshold: Option<u32>,
    pub protocol: Option<String>,
    pub high_risk_tools: Option<Vec<String>>,
    pub danger_patterns: Option<Vec<String>>,
    pub mutating_tool_markers: Option<Vec<String>>,
    pub model_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RawToolGateway {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RawModel {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub api_path: Option<String>,
    pub embedding_model: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RawRules {
    pub min_samples: Option<u32>,
    pub max_active: Option<usize>,
    pub expiry_days: Option<i64>,
    pub cooldown_hours: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RawPlanner {
    pub max_parallel: Option<usize>,
    pub max_retries: Option<u32>,
    pub min_subtasks: Option<usize>,
    pub max_subtasks: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RawMemory {
    pub data_dir: Option<String>,
    pub consolidate_every: Option<usize>,
    pub skill_threshold: Option<f32>,
}

/// Ensures environment variables are loaded from config/.env
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = from_filename("config/.env");
    });
}

/// Load and validate configuration from a file path
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    let config_path = path.unwrap_or_else(|| Path::new(CONFIG_PATH));
    read_config(config_path)
}

/// Parse configuration from TOML text without touching the filesystem.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let parsed: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: Path::new("<inline>").to_path_buf(),
        source,
    })?;
    validate_and_build(parsed)
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading nexus configuration file");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    validate_and_build(parsed)
}

pub(super) fn load_scopes(path: &Path) -> Result<Vec<Scope>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Scopes {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_and_build(parsed: RawConfig) -> Result<AppConfig, ConfigError> {
    let agent = build_agent(parsed.agent)?;
    let tool_gateway = build_tool_gateway(parsed.tool_gateway)?;
    let rules = build_rules(parsed.rules)?;
    let planner = build_planner(parsed.planner)?;

    let model_defaults = ModelConfig::default();
    let model = ModelConfig {
        endpoint: parsed.model.endpoint.unwrap_or(model_defaults.endpoint),
        model: parsed.model.model.unwrap_or(model_defaults.model),
        api_key_env: parsed.model.api_key_env.or(model_defaults.api_key_env),
        api_path: parsed.model.api_path.unwrap_or(model_defaults.api_path),
        embedding_model: parsed.model.embedding_model,
    };

    let memory_defaults = MemoryConfig::default();
    let memory = MemoryConfig {
        data_dir: parsed
            .memory
            .data_dir
            .as_deref()
            .map(expand_path)
            .unwrap_or(memory_defaults.data_dir),
        consolidate_every: parsed
            .memory
            .consolidate_every
            .unwrap_or(memory_defaults.consolidate_every),
        skill_threshold: parsed
            .memory
            .skill_threshold
            .unwrap_or(memory_defaults.skill_threshold),
    };
    if memory.consolidate_every == 0 {
        return Err(ConfigError::MustBePositive {
            field: "memory.consolidate_every",
        });
    }

    Ok(AppConfig {
        agent,
        tool_gateway,
        model,
        rules,
        planner,
        memory,
        tools: parsed.tools,
        skills: parsed.skills,
        scopes_path: parsed.scopes_path.as_deref().map(expand_path),
    })
}

fn build_agent(raw: RawAgent) -> Result<AgentConfig, ConfigError> {
    let defaults = AgentConfig::default();
    let simple = raw.simple_turns.unwrap_or(defaults.simple_turns);
    let normal = raw.normal_turns.unwrap_or(defaults.normal_turns);
    let heavy = raw.heavy_turns.unwrap_or(defaults.heavy_turns);
    if simple == 0 || simple > normal || normal > heavy {
        return Err(ConfigError::InvalidTurnBudget {
            simple,
            normal,
            heavy,
        });
    }

    let threshold = raw
        .escalation_skip_threshold
        .unwrap_or(u32::from(defaults.escalation_skip_threshold));
    if threshold > 100 {
        return Err(ConfigError::InvalidThreshold(threshold));
    }

    let protocol = match raw.protocol.as_deref() {
        Some(value) => ProtocolMode::parse(value)?,
        None => defaults.protocol,
    };

    Ok(AgentConfig {
        simple_turns: simple,
        normal_turns: normal,
        heavy_turns: heavy,
        escalation_turns: raw.escalation_turns.unwrap_or(defaults.escalation_turns),
        max_escalations: raw.max_escalations.unwrap_or(defaults.max_escalations),
        escalation_skip_threshold: threshold as u8,
        protocol,
        high_risk_tools: raw.high_risk_tools.unwrap_or(defaults.high_risk_tools),
        danger_patterns: raw
            .danger_patterns
            .map(|patterns| patterns.into_iter().map(|p| p.to_lowercase()).collect())
            .unwrap_or(defaults.danger_patterns),
        mutating_tool_markers: raw
            .mutating_tool_markers
            .unwrap_or(defaults.mutating_tool_markers),
        model_timeout: raw
            .model_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.model_timeout),
    })
}

fn build_tool_gateway(raw: RawToolGateway) -> Result<ToolGatewayConfig, ConfigError> {
    let defaults = ToolGatewayConfig::default();
    let timeout = raw
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(defaults.timeout);
    if timeout.is_zero() {
        return Err(ConfigError::MustBePositive {
            field: "tool_gateway.timeout_secs",
        });
    }
    Ok(ToolGatewayConfig {
        endpoint: raw.endpoint.unwrap_or(defaults.endpoint),
        timeout,
        max_retries: raw.max_retries.unwrap_or(defaults.max_retries),
        base_delay: raw
            .base_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.base_delay),
    })
}

fn build_rules(raw: RawRules) -> Result<RuleConfig, ConfigError> {
    let defaults = RuleConfig::default();
    let max_active = raw.max_active.unwrap_or(defaults.max_active);
    if max_active == 0 {
        return Err(ConfigError::MustBePositive {
            field: "rules.max_active",
        });
    }
    Ok(RuleConfig {
        min_samples: raw.min_samples.unwrap_or(defaults.min_samples),
        max_active,
        expiry: raw
            .expiry_days
            .map(chrono::Duration::days)
            .unwrap_or(defaults.expiry),
        cooldown: raw
            .cooldown_hours
            .map(chrono::Duration::hours)
            .unwrap_or(defaults.cooldown),
    })
}

fn build_planner(raw: RawPlanner) -> Result<PlannerConfig, ConfigError> {
    let defaults = PlannerConfig::default();
    let max_parallel = raw.max_parallel.unwrap_or(defaults.max_parallel);
    if max_parallel == 0 {
        return Err(ConfigError::MustBePositive {
            field: "planner.max_parallel",
        });
    }
    let min = raw.min_subtasks.unwrap_or(defaults.min_subtasks);
    let max = raw.max_subtasks.unwrap_or(defaults.max_subtasks);
    if min > max {
        return Err(ConfigError::InvalidSubtaskBounds { min, max });
    }
    Ok(PlannerConfig {
        max_parallel,
        max_retries: raw.max_retries.unwrap_or(defaults.max_retries),
        min_subtasks: min,
        max_subtasks: max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = parse_config("").expect("defaults");
        assert_eq!(config.agent.simple_turns, super::super::defaults::SIMPLE_TURNS);
        assert_eq!(config.agent.protocol, ProtocolMode::Text);
        assert_eq!(config.rules.max_active, 3);
        assert_eq!(config.planner.max_parallel, 3);
        assert!(config.tools.is_empty());
    }

    #[test]
    fn rejects_inverted_turn_budgets() {
        let result = parse_config(
            r#"
[agent]
simple_turns = 10
normal_turns = 5
"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::InvalidTurnBudget { simple: 10, normal: 5, .. })
        ));
    }

    #[test]
    fn parses_native_protocol_and_tool_catalog() {
        let config = parse_config(
            r#"
[agent]
protocol = "native"
danger_patterns = ["RM -RF"]

[[tools]]
name = "readFile"
kind = "builtin"
description = "Read a file"

[[tools]]
name = "mcp_github_create_issue"
kind = "mcp"
server = "github"
"#,
        )
        .expect("config");

        assert_eq!(config.agent.protocol, ProtocolMode::Native);
        assert_eq!(config.agent.danger_patterns, vec!["rm -rf".to_string()]);
        assert_eq!(config.tools.len(), 2);
        assert_eq!(config.tools[1].server.as_deref(), Some("github"));
    }

    #[test]
    fn rejects_unknown_protocol() {
        let result = parse_config("[agent]\nprotocol = \"carrier-pigeon\"\n");
        assert!(matches!(result, Err(ConfigError::UnknownProtocol(_))));
    }
}
