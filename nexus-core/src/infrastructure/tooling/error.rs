use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("tool gateway transport error: {message}")]
    Transport { message: String },
    #[error("tool gateway timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("tool gateway returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("tool gateway returned invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl ToolInvokeError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}
