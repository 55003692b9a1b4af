use std::time::Duration;
use thiserror::Error;

use crate::infrastructure::model::ModelError;

/// Failures that end a run early. They are folded into an `AgentOutcome`
/// with status `Error` or `Cancelled`; `ExecutionLoop::run` never returns
/// them.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("model turn timed out after {0:?}")]
    Timeout(Duration),
    #[error("task cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Model(err) => err.user_message(),
            AgentError::Timeout(after) => {
                format!("The model did not answer within {}s.", after.as_secs())
            }
            AgentError::Cancelled => "The task was cancelled.".to_string(),
        }
    }
}
