//! Model traits

use super::types::{ModelError, StreamResponse};
use crate::domain::{ChatMessage, ToolDescriptor};
use async_trait::async_trait;

/// Narrow contract to the language model.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Plain completion of a conversation.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError>;

    /// Completion that may return discrete function calls for `tools`.
    ///
    /// Gateways without native tool calling fall back to `complete`.
    async fn stream(
        &self,
        messages: &[ChatMessage],
        _tools: Option<&[ToolDescriptor]>,
    ) -> Result<StreamResponse, ModelError> {
        let text = self.complete(messages).await?;
        Ok(StreamResponse::text(text))
    }
}

#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// One vector per input, in order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ModelError>;
}
