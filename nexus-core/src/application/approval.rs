//! Human-in-the-loop decisions for risky tool calls and flagged sub-tasks.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject { reason: String },
    Skip,
    /// Abort the whole task or plan.
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalSubject {
    ToolCall { tool: String },
    SubTask { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub subject: ApprovalSubject,
    /// What will run: arguments or the sub-task description.
    pub detail: String,
    pub reason: String,
}

#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn decide(&self, request: &ApprovalRequest) -> ApprovalDecision;
}

/// Approves everything. Used for unattended runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalGate for AutoApprove {
    async fn decide(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Approve
    }
}

/// Rejects every request with a fixed reason.
#[derive(Debug, Clone)]
pub struct DenyAll {
    reason: String,
}

impl DenyAll {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ApprovalGate for DenyAll {
    async fn decide(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Reject {
            reason: self.reason.clone(),
        }
    }
}
