pub mod app;
pub mod defaults;
pub mod error;
pub mod loader;

/// Default config file path - can be overridden via CLI argument
pub const CONFIG_PATH: &str = "config/nexus.toml";

pub use app::{
    AgentConfig, AppConfig, MemoryConfig, ModelConfig, PlannerConfig, ProtocolMode, RuleConfig,
    ToolGatewayConfig,
};
pub use error::ConfigError;
