use std::time::Duration;
use thiserror::Error;

use crate::infrastructure::model::ModelError;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("planner model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("plan reply is not a JSON sub-task array: {0}")]
    Unparseable(String),
    #[error("plan contains no sub-tasks")]
    Empty,
    #[error("sub-task '{id}' failed: {message}")]
    SubTask { id: String, message: String },
}

impl PlanError {
    pub fn sub_task(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SubTask {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PlanError::Model(err) => err.user_message(),
            PlanError::Timeout(after) => {
                format!("Planning did not finish within {}s.", after.as_secs())
            }
            PlanError::Unparseable(_) | PlanError::Empty => {
                "The task could not be split into steps; it will run as a single task.".to_string()
            }
            PlanError::SubTask { id, message } => format!("Step {id} failed: {message}"),
        }
    }
}
