use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ToolInvokeError;
use crate::domain::ToolStatus;

/// Gateway reply to one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub status: ToolStatus,
    #[serde(default)]
    pub result: Value,
}

impl ToolResponse {
    pub fn success(result: impl Into<Value>) -> Self {
        Self {
            status: ToolStatus::Success,
            result: result.into(),
        }
    }

    pub fn error(result: impl Into<Value>) -> Self {
        Self {
            status: ToolStatus::Error,
            result: result.into(),
        }
    }

    /// Result flattened to the text the model sees.
    pub fn result_text(&self) -> String {
        match &self.result {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
pub trait ToolGateway: Send + Sync {
    async fn invoke(&self, name: &str, args: Value) -> Result<ToolResponse, ToolInvokeError>;
}
