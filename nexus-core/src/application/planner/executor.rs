use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::PlanError;
use crate::application::approval::{ApprovalDecision, ApprovalGate, ApprovalRequest, ApprovalSubject};
use crate::domain::{PlanStatus, SubTask, SubTaskStatus, TaskPlan};
use crate::text;

const DEPENDENCY_RESULT_CHARS: usize = 500;
const SUMMARY_RESULT_CHARS: usize = 160;

/// Executes one sub-task. `prompt` carries the overall request and the
/// results of the sub-task's dependencies.
#[async_trait]
pub trait SubTaskRunner: Send + Sync {
    async fn run_subtask(&self, subtask: &SubTask, prompt: &str) -> Result<String, PlanError>;
}

/// Runs a `TaskPlan` wave by wave, at most `max_parallel` sub-tasks at a
/// time. A sub-task starts only when every dependency is done or skipped.
pub struct DagExecutor {
    runner: Arc<dyn SubTaskRunner>,
    approval: Arc<dyn ApprovalGate>,
    max_parallel: usize,
}

impl DagExecutor {
    pub fn new(runner: Arc<dyn SubTaskRunner>, approval: Arc<dyn ApprovalGate>, max_parallel: usize) -> Self {
        Self {
            runner,
            approval,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Drives `plan` to a terminal status and returns the summary text.
    pub async fn execute(&self, plan: &mut TaskPlan) -> String {
        plan.status = PlanStatus::Executing;
        info!(plan = %plan.id, subtasks = plan.subtasks.len(), "Plan execution started");

        loop {
            propagate_blocked(plan);
            let ready = ready_ids(plan);
            if ready.is_empty() {
                break;
            }

            let mut batch = Vec::new();
            for id in ready {
                if batch.len() == self.max_parallel {
                    break;
                }
                match self.admit(plan, &id).await {
                    Admission::Run => batch.push(id),
                    Admission::Settled => {}
                    Admission::Cancel => {
                        plan.status = PlanStatus::Cancelled;
                        info!(plan = %plan.id, subtask = %id, "Plan cancelled at approval");
                        return summarize(plan);
                    }
                }
            }
            if batch.is_empty() {
                continue;
            }

            let jobs: Vec<(SubTask, String)> = batch
                .iter()
                .filter_map(|id| {
                    let prompt = subtask_prompt(plan, id)?;
                    let task = mark_executing(plan, id)?;
                    Some((task, prompt))
                })
                .collect();
            let results = join_all(
                jobs.iter()
                    .map(|(task, prompt)| run_with_retries(self.runner.as_ref(), task, prompt)),
            )
            .await;

            for ((task, _), (result, retries)) in jobs.iter().zip(results) {
                apply_result(plan, &task.id, result, retries);
            }
        }

        for task in &mut plan.subtasks {
            if !task.status.is_terminal() {
                task.status = SubTaskStatus::Blocked;
                task.blocked_reason = Some("dependencies never completed".to_string());
            }
        }
        plan.status = if plan
            .subtasks
            .iter()
            .any(|task| task.status.is_dead_end())
        {
            PlanStatus::Failed
        } else {
            PlanStatus::Done
        };
        info!(plan = %plan.id, status = ?plan.status, "Plan execution finished");
        summarize(plan)
    }

    async fn admit(&self, plan: &mut TaskPlan, id: &str) -> Admission {
        let Some(task) = plan.subtasks.iter_mut().find(|task| task.id == id) else {
            return Admission::Settled;
        };
        if !task.approval_required || task.status == SubTaskStatus::Ready {
            task.status = SubTaskStatus::Ready;
            return Admission::Run;
        }
        task.status = SubTaskStatus::PausedForApproval;
        let request = ApprovalRequest {
            subject: ApprovalSubject::SubTask { id: task.id.clone() },
            detail: task.description.clone(),
            reason: task
                .approval_reason
                .clone()
                .unwrap_or_else(|| "flagged as requiring approval".to_string()),
        };
        match self.approval.decide(&request).await {
            ApprovalDecision::Approve => {
                task.status = SubTaskStatus::Ready;
                Admission::Run
            }
            ApprovalDecision::Reject { reason } => {
                task.status = SubTaskStatus::Skipped;
                task.result = Some(format!("rejected: {reason}"));
                task.finished_at = Some(Utc::now());
                Admission::Settled
            }
            ApprovalDecision::Skip => {
                task.status = SubTaskStatus::Skipped;
                task.finished_at = Some(Utc::now());
                Admission::Settled
            }
            ApprovalDecision::Cancel => Admission::Cancel,
        }
    }
}

enum Admission {
    Run,
    Settled,
    Cancel,
}

async fn run_with_retries(runner: &dyn SubTaskRunner, task: &SubTask, prompt: &str) -> (Result<String, PlanError>, u32) {
    let mut retries = 0;
    loop {
        match runner.run_subtask(task, prompt).await {
            Ok(result) => return (Ok(result), retries),
            Err(err) if retries < task.max_retries => {
                retries += 1;
                warn!(subtask = %task.id, retry = retries, error = %err, "Retrying sub-task");
            }
            Err(err) => return (Err(err), retries),
        }
    }
}

/// Marks pending sub-tasks whose dependencies failed or were blocked, until
/// nothing changes.
fn propagate_blocked(plan: &mut TaskPlan) {
    loop {
        let mut changed = false;
        for position in 0..plan.subtasks.len() {
            if !matches!(plan.subtasks[position].status, SubTaskStatus::Pending | SubTaskStatus::Ready) {
                continue;
            }
            let dead = plan.subtasks[position].depends_on.iter().find_map(|dep| {
                plan.status_of(dep)
                    .filter(|status| status.is_dead_end())
                    .map(|status| (dep.clone(), status))
            });
            if let Some((dep, status)) = dead {
                let task = &mut plan.subtasks[position];
                task.status = SubTaskStatus::Blocked;
                task.blocked_reason = Some(format!("depends on {dep} which {}", status.as_str()));
                task.finished_at = Some(Utc::now());
                changed = true;
            }
        }
        if !changed {
            return;
        }
    }
}

fn ready_ids(plan: &TaskPlan) -> Vec<String> {
    plan.subtasks
        .iter()
        .filter(|task| matches!(task.status, SubTaskStatus::Pending | SubTaskStatus::Ready))
        .filter(|task| {
            task.depends_on
                .iter()
                .all(|dep| plan.status_of(dep).is_some_and(SubTaskStatus::satisfies_dependency))
        })
        .map(|task| task.id.clone())
        .collect()
}

fn mark_executing(plan: &mut TaskPlan, id: &str) -> Option<SubTask> {
    let task = plan.subtasks.iter_mut().find(|task| task.id == id)?;
    task.status = SubTaskStatus::Executing;
    task.started_at = Some(Utc::now());
    Some(task.clone())
}

fn apply_result(plan: &mut TaskPlan, id: &str, result: Result<String, PlanError>, retries: u32) {
    let Some(task) = plan.subtasks.iter_mut().find(|task| task.id == id) else {
        return;
    };
    task.retries = retries;
    task.finished_at = Some(Utc::now());
    match result {
        Ok(output) => {
            info!(subtask = %id, "Sub-task done");
            task.status = SubTaskStatus::Done;
            task.result = Some(output);
        }
        Err(err) => {
            warn!(subtask = %id, retries, error = %err, "Sub-task failed");
            task.status = SubTaskStatus::Failed;
            task.error = Some(err.to_string());
        }
    }
}

fn subtask_prompt(plan: &TaskPlan, id: &str) -> Option<String> {
    let task = plan.get(id)?;
    let mut prompt = format!(
        "Overall request: {}\n\nYour sub-task ({}): {}",
        plan.request, task.id, task.description
    );
    if let Some(hint) = &task.tool_hint {
        prompt.push_str(&format!("\nSuggested tool: {hint}"));
    }
    let inputs: Vec<String> = task
        .depends_on
        .iter()
        .filter_map(|dep| plan.get(dep))
        .filter_map(|dep| {
            dep.result
                .as_deref()
                .map(|result| format!("- {}: {}", dep.id, text::truncate(result, DEPENDENCY_RESULT_CHARS)))
        })
        .collect();
    if !inputs.is_empty() {
        prompt.push_str("\n\nResults of earlier sub-tasks:\n");
        prompt.push_str(&inputs.join("\n"));
    }
    Some(prompt)
}

/// Status header plus one line per sub-task.
pub fn summarize(plan: &TaskPlan) -> String {
    let done = plan
        .subtasks
        .iter()
        .filter(|task| task.status == SubTaskStatus::Done)
        .count();
    let status = match plan.status {
        PlanStatus::Planned => "planned",
        PlanStatus::Executing => "executing",
        PlanStatus::Done => "done",
        PlanStatus::Failed => "failed",
        PlanStatus::Cancelled => "cancelled",
    };
    let mut lines = vec![format!(
        "Plan {status}: {done}/{} sub-tasks done",
        plan.subtasks.len()
    )];
    for task in &plan.subtasks {
        let mut line = format!("- [{}] {}: {}", task.status.as_str(), task.id, task.description);
        let detail = match task.status {
            SubTaskStatus::Done | SubTaskStatus::Skipped => task.result.as_deref(),
            SubTaskStatus::Failed => task.error.as_deref(),
            SubTaskStatus::Blocked => task.blocked_reason.as_deref(),
            _ => None,
        };
        if let Some(detail) = detail {
            line.push_str(&format!(" ({})", text::truncate(&detail.replace('\n', " "), SUMMARY_RESULT_CHARS)));
        }
        lines.push(line);
    }
    lines.join("\n")
}
