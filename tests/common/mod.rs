//! Scripted gateways shared by the scenario tests.
#![allow(dead_code)]

use async_trait::async_trait;
use nexus_core::config::AppConfig;
use nexus_core::config::loader::parse_config;
use nexus_core::domain::{ChatMessage, ToolDescriptor};
use nexus_core::infrastructure::model::{ModelError, ModelGateway, StreamResponse};
use nexus_core::infrastructure::tooling::{ToolGateway, ToolInvokeError, ToolResponse};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Replies in order; an exhausted script reports the model as unavailable.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    responses: Arc<Mutex<VecDeque<String>>>,
    recordings: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Into::into).collect())),
            recordings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.recordings.lock().await.clone()
    }
}

#[async_trait]
impl ModelGateway for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        self.recordings.lock().await.push(messages.to_vec());
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| ModelError::Unavailable("script exhausted".into()))
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        _tools: Option<&[ToolDescriptor]>,
    ) -> Result<StreamResponse, ModelError> {
        Ok(StreamResponse::text(self.complete(messages).await?))
    }
}

/// Answers `ok` unless a tool has a canned response; records every call.
#[derive(Clone, Default)]
pub struct StubTools {
    responses: HashMap<String, ToolResponse>,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl StubTools {
    pub fn with(mut self, tool: &str, response: ToolResponse) -> Self {
        self.responses.insert(tool.to_string(), response);
        self
    }

    pub async fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ToolGateway for StubTools {
    async fn invoke(&self, name: &str, args: Value) -> Result<ToolResponse, ToolInvokeError> {
        self.calls.lock().await.push((name.to_string(), args));
        Ok(self
            .responses
            .get(name)
            .cloned()
            .unwrap_or_else(|| ToolResponse::success("ok")))
    }
}

/// Parses `extra` TOML and points the data root at `data_dir`. Consolidation
/// is pushed out of reach so scripted replies are never consumed by it.
pub fn config(data_dir: &Path, extra: &str) -> AppConfig {
    let toml = format!(
        "{extra}\n[memory]\ndata_dir = \"{}\"\nconsolidate_every = 1000\n",
        data_dir.display().to_string().replace('\\', "/")
    );
    parse_config(&toml).expect("test config parses")
}

/// A fenced tool call in the text protocol.
pub fn call(tool: &str, args: Value) -> String {
    format!("```json\n{}\n```", json!({ "tool": tool, "args": args }))
}
