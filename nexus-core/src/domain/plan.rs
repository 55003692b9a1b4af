use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskStatus {
    Pending,
    Ready,
    Executing,
    Done,
    Failed,
    Blocked,
    Skipped,
    PausedForApproval,
}

impl SubTaskStatus {
    /// Dependencies in these states let dependents run.
    pub fn satisfies_dependency(self) -> bool {
        matches!(self, SubTaskStatus::Done | SubTaskStatus::Skipped)
    }

    /// Dependencies in these states can never be satisfied.
    pub fn is_dead_end(self) -> bool {
        matches!(self, SubTaskStatus::Failed | SubTaskStatus::Blocked)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubTaskStatus::Done | SubTaskStatus::Failed | SubTaskStatus::Blocked | SubTaskStatus::Skipped
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubTaskStatus::Pending => "pending",
            SubTaskStatus::Ready => "ready",
            SubTaskStatus::Executing => "executing",
            SubTaskStatus::Done => "done",
            SubTaskStatus::Failed => "failed",
            SubTaskStatus::Blocked => "blocked",
            SubTaskStatus::Skipped => "skipped",
            SubTaskStatus::PausedForApproval => "paused_for_approval",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_hint: Option<String>,
    pub status: SubTaskStatus,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub approval_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_reason: Option<String>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
}

impl SubTask {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            tool_hint: None,
            status: SubTaskStatus::Pending,
            depends_on: Vec::new(),
            approval_required: false,
            approval_reason: None,
            retries: 0,
            max_retries: 0,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
            blocked_reason: None,
        }
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn requiring_approval(mut self, reason: impl Into<String>) -> Self {
        self.approval_required = true;
        self.approval_reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Planned,
    Executing,
    Done,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub id: String,
    pub request: String,
    pub subtasks: Vec<SubTask>,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
}

impl TaskPlan {
    pub fn new(request: impl Into<String>, subtasks: Vec<SubTask>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request: request.into(),
            subtasks,
            status: PlanStatus::Planned,
            created_at: Utc::now(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&SubTask> {
        self.subtasks.iter().find(|task| task.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<SubTaskStatus> {
        self.get(id).map(|task| task.status)
    }
}
