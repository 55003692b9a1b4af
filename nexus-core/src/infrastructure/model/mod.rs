//! Model gateway seam.
//!
//! # Structure
//! - `types` - Stream response, finish reason and error types
//! - `traits` - `ModelGateway` and `EmbeddingGateway`
//! - `openai` - OpenAI-compatible HTTP adapter (feature `http-gateways`)

#[cfg(feature = "http-gateways")]
pub mod openai;
pub mod traits;
pub mod types;

#[cfg(feature = "http-gateways")]
pub use openai::OpenAiGateway;
pub use traits::{EmbeddingGateway, ModelGateway};
pub use types::{FinishReason, ModelError, StreamResponse};
