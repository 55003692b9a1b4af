//! Model types - stream response and error types

use crate::domain::FunctionCall;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Other(String),
}

impl FinishReason {
    pub fn parse(value: &str) -> Self {
        match value {
            "stop" | "end_turn" => FinishReason::Stop,
            "tool_calls" | "function_call" | "tool_use" => FinishReason::ToolCalls,
            "length" | "max_tokens" => FinishReason::Length,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamResponse {
    pub text: String,
    pub function_calls: Vec<FunctionCall>,
    pub finish_reason: FinishReason,
}

impl StreamResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            function_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
        }
    }

    pub fn calls(text: impl Into<String>, calls: Vec<FunctionCall>) -> Self {
        Self {
            text: text.into(),
            function_calls: calls,
            finish_reason: FinishReason::ToolCalls,
        }
    }
}

/// Model errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("provider '{provider}' requires an API key")]
    MissingApiKey { provider: String },
    #[error("network error calling provider '{provider}': {message}")]
    Network { provider: String, message: String },
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
    #[error("model gateway unavailable: {0}")]
    Unavailable(String),
}

impl ModelError {
    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ModelError::MissingApiKey { provider } => {
                format!("Provider '{provider}' needs an API key; set it in config/.env.")
            }
            ModelError::Network { provider, .. } => {
                format!("Could not reach the model provider '{provider}'.")
            }
            ModelError::Timeout(after) => {
                format!("The model did not answer within {}s.", after.as_secs())
            }
            ModelError::InvalidResponse { provider, .. } => {
                format!("The response from '{provider}' could not be understood.")
            }
            ModelError::Unavailable(reason) => format!("The model is unavailable: {reason}"),
        }
    }
}
