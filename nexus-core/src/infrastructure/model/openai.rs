//! OpenAI-compatible gateway (works with OpenAI, Ollama's /v1 surface, vLLM, Groq, etc.)

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::env;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::traits::{EmbeddingGateway, ModelGateway};
use super::types::{FinishReason, ModelError, StreamResponse};
use crate::config::ModelConfig;
use crate::domain::{ChatMessage, FunctionCall, MessageRole, ToolDescriptor};

const PROVIDER_ID: &str = "openai-compatible";

#[derive(Clone)]
pub struct OpenAiGateway {
    endpoint: String,
    api_path: String,
    model: String,
    embedding_model: Option<String>,
    api_key: Option<String>,
    http: Client,
}

impl OpenAiGateway {
    pub fn from_config(config: &ModelConfig, timeout: Duration) -> Result<Self, ModelError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ModelError::network(PROVIDER_ID, err.to_string()))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_path: config.api_path.clone(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            api_key: resolve_api_key(config.api_key_env.as_deref()),
            http,
        })
    }

    /// Build URL from endpoint and path
    fn build_url(&self, path: &str) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    async fn post<Req, Res>(&self, url: &str, body: &Req) -> Result<Res, ModelError>
    where
        Req: Serialize + Sync,
        Res: DeserializeOwned,
    {
        let mut request = self.http.post(url).json(body);
        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }
        request
            .send()
            .await
            .map_err(classify)?
            .error_for_status()
            .map_err(classify)?
            .json()
            .await
            .map_err(|e| ModelError::invalid_response(PROVIDER_ID, e.to_string()))
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDescriptor]>,
    ) -> Result<StreamResponse, ModelError> {
        let url = self.build_url(&self.api_path);
        let tool_specs = tools
            .filter(|tools| !tools.is_empty())
            .map(|tools| tools.iter().map(to_function_spec).collect::<Vec<_>>());

        let payload = ChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(to_openai_message).collect(),
            stream: false,
            tools: tool_specs,
        };

        info!(
            model = self.model.as_str(),
            messages = messages.len(),
            native_tools = payload.tools.as_ref().map(Vec::len).unwrap_or(0),
            "Sending request to OpenAI-compatible provider"
        );

        let response: ChatResponse = self.post(&url, &payload).await?;
        debug!("Received response from OpenAI-compatible provider");

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::invalid_response(PROVIDER_ID, "missing choices"))?;
        let message = choice
            .message
            .ok_or_else(|| ModelError::invalid_response(PROVIDER_ID, "missing message"))?;

        let function_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| FunctionCall {
                id: call.id,
                arguments: parse_arguments(&call.function.arguments),
                name: call.function.name,
            })
            .collect::<Vec<_>>();

        let finish_reason = match choice.finish_reason.as_deref() {
            Some(reason) => FinishReason::parse(reason),
            None if !function_calls.is_empty() => FinishReason::ToolCalls,
            None => FinishReason::Stop,
        };

        Ok(StreamResponse {
            text: message.content.unwrap_or_default(),
            function_calls,
            finish_reason,
        })
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        Ok(self.chat(messages, None).await?.text)
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDescriptor]>,
    ) -> Result<StreamResponse, ModelError> {
        self.chat(messages, tools).await
    }
}

#[async_trait]
impl EmbeddingGateway for OpenAiGateway {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let Some(model) = self.embedding_model.clone() else {
            return Err(ModelError::Unavailable("no embedding model configured".into()));
        };
        let url = self.build_url("/v1/embeddings");
        let payload = json!({ "model": model, "input": inputs });
        let response: EmbeddingResponse = self.post(&url, &payload).await?;
        let mut data = response.data;
        data.sort_by_key(|item| item.index);
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

/// Resolve API key from environment variable
fn resolve_api_key(spec: Option<&str>) -> Option<String> {
    let raw = spec.map(str::trim).filter(|raw| !raw.is_empty())?;
    match env::var(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(env_var = raw, %err, "API key environment variable is not set");
            None
        }
    }
}

fn classify(error: reqwest::Error) -> ModelError {
    if error.is_timeout() {
        ModelError::network(PROVIDER_ID, format!("timed out: {error}"))
    } else {
        ModelError::network(PROVIDER_ID, error.to_string())
    }
}

/// Providers return arguments as a JSON-encoded string; keep raw text when it
/// does not parse so the loop can still report it.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn to_openai_message(message: &ChatMessage) -> Value {
    let mut value = json!({
        "role": message.role.as_str(),
        "content": message.content,
    });
    if message.role == MessageRole::Tool {
        if let Some(id) = &message.tool_call_id {
            value["tool_call_id"] = json!(id);
        }
    }
    if !message.tool_calls.is_empty() {
        let calls = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments.to_string(),
                    }
                })
            })
            .collect();
        value["tool_calls"] = Value::Array(calls);
    }
    value
}

fn to_function_spec(tool: &ToolDescriptor) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Value>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallPayload>>,
}

#[derive(Deserialize)]
struct ToolCallPayload {
    #[serde(default)]
    id: String,
    function: FunctionPayload,
}

#[derive(Deserialize)]
struct FunctionPayload {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_messages_carry_call_id_and_assistant_calls() {
        let tool = to_openai_message(&ChatMessage::tool_result("call_1", "42"));
        assert_eq!(tool["tool_call_id"], "call_1");

        let assistant = to_openai_message(&ChatMessage::assistant_calls(
            "",
            vec![FunctionCall {
                id: "call_1".into(),
                name: "calc".into(),
                arguments: json!({"x": 1}),
            }],
        ));
        assert_eq!(assistant["tool_calls"][0]["function"]["name"], "calc");
        assert_eq!(assistant["tool_calls"][0]["function"]["arguments"], "{\"x\":1}");
    }

    #[test]
    fn unparseable_arguments_are_kept_as_text() {
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_arguments("not json"), json!("not json"));
    }
}
