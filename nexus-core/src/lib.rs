//! Nexus agent core.
//!
//! # Structure
//! - `domain` - Plain data: tools, scopes, traces, rules, plans and memory
//! - `config` - `nexus.toml` loading and validation
//! - `infrastructure` - Model and tool gateways, JSON stores and caches
//! - `application` - Routing, the execution loop, validation, rules,
//!   memory and planning
//! - `orchestrator` - Long-lived service owner used by frontends

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod orchestrator;
pub mod text;

pub use application::agent::{AgentOutcome, ExecutionLoop, RunOptions, RunStatus};
pub use config::{AppConfig, ConfigError};
pub use orchestrator::Orchestrator;
