use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse scope file {path:?}: {source}")]
    Scopes {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("turn budgets must satisfy 0 < simple <= normal <= heavy (got {simple}/{normal}/{heavy})")]
    InvalidTurnBudget { simple: u32, normal: u32, heavy: u32 },

    #[error("unknown protocol '{0}' (expected 'text' or 'native')")]
    UnknownProtocol(String),

    #[error("'{field}' must be greater than zero")]
    MustBePositive { field: &'static str },

    #[error("escalation_skip_threshold must be within 0..=100 (got {0})")]
    InvalidThreshold(u32),

    #[error("planner subtask bounds are inverted: min {min} > max {max}")]
    InvalidSubtaskBounds { min: usize, max: usize },
}
