use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::PlanError;
use crate::config::PlannerConfig;
use crate::domain::{ChatMessage, SubTask, TaskPlan};
use crate::infrastructure::model::ModelGateway;

/// Model-facing sub-task shape.
#[derive(Debug, Deserialize)]
struct RawSubTask {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, alias = "task", alias = "title")]
    description: String,
    #[serde(default, alias = "tool", alias = "toolHint")]
    tool_hint: Option<String>,
    #[serde(default, alias = "dependsOn", alias = "dependencies", alias = "deps")]
    depends_on: Vec<Value>,
    #[serde(default, alias = "approvalRequired", alias = "needs_approval")]
    approval_required: bool,
    #[serde(default, alias = "approvalReason")]
    approval_reason: Option<String>,
}

/// Splits a request into a dependency graph of sub-tasks.
pub struct TaskPlanner {
    model: Arc<dyn ModelGateway>,
    config: PlannerConfig,
    timeout: Duration,
}

impl TaskPlanner {
    pub fn new(model: Arc<dyn ModelGateway>, config: PlannerConfig, timeout: Duration) -> Self {
        Self {
            model,
            config,
            timeout,
        }
    }

    /// Never fails: an unusable reply becomes a one-node plan.
    pub async fn plan(&self, request: &str) -> TaskPlan {
        match self.try_plan(request).await {
            Ok(plan) => plan,
            Err(err) => {
                warn!(error = %err, "Planning failed, falling back to a single sub-task");
                self.single_node(request)
            }
        }
    }

    pub async fn try_plan(&self, request: &str) -> Result<TaskPlan, PlanError> {
        let messages = [
            ChatMessage::system(self.instructions()),
            ChatMessage::user(request),
        ];
        let reply = tokio::time::timeout(self.timeout, self.model.complete(&messages))
            .await
            .map_err(|_| PlanError::Timeout(self.timeout))??;
        let subtasks = parse_subtasks(&reply, &self.config)?;
        info!(subtasks = subtasks.len(), "Plan created");
        Ok(TaskPlan::new(request, subtasks))
    }

    pub fn single_node(&self, request: &str) -> TaskPlan {
        let mut task = SubTask::new("t1", request);
        task.max_retries = self.config.max_retries;
        TaskPlan::new(request, vec![task])
    }

    fn instructions(&self) -> String {
        format!(
            "Split the user's request into {min} to {max} concrete sub-tasks. \
Reply with a JSON array only. Each element: \
{{\"id\": \"t1\", \"description\": string, \"tool_hint\": string|null, \
\"depends_on\": [ids], \"approval_required\": bool, \"approval_reason\": string|null}}. \
Use depends_on only for sub-tasks that need another's result; independent sub-tasks run in parallel. \
Set approval_required for irreversible or destructive steps.",
            min = self.config.min_subtasks,
            max = self.config.max_subtasks,
        )
    }
}

/// Parses the model reply into sub-tasks: duplicate ids are dropped, the
/// list is truncated to `max_subtasks`, unknown and self dependencies are
/// removed and cycles are broken.
pub fn parse_subtasks(reply: &str, config: &PlannerConfig) -> Result<Vec<SubTask>, PlanError> {
    let array = extract_array(reply).ok_or_else(|| PlanError::Unparseable(preview(reply)))?;
    let raw: Vec<RawSubTask> =
        serde_json::from_str(array).map_err(|err| PlanError::Unparseable(err.to_string()))?;

    let mut seen = HashSet::new();
    let mut subtasks = Vec::new();
    for (index, item) in raw.into_iter().enumerate() {
        let id = item
            .id
            .as_ref()
            .and_then(id_text)
            .unwrap_or_else(|| format!("t{}", index + 1));
        let description = match item.description.trim() {
            "" => id.clone(),
            text => text.to_string(),
        };
        if !seen.insert(id.clone()) {
            debug!(id = %id, "Dropping duplicate sub-task id");
            continue;
        }
        let mut task = SubTask::new(id, description);
        task.tool_hint = item.tool_hint.filter(|hint| !hint.trim().is_empty());
        task.depends_on = item.depends_on.iter().filter_map(id_text).collect();
        task.approval_required = item.approval_required;
        task.approval_reason = item.approval_reason.filter(|reason| !reason.trim().is_empty());
        task.max_retries = config.max_retries;
        subtasks.push(task);
        if subtasks.len() == config.max_subtasks {
            break;
        }
    }
    if subtasks.is_empty() {
        return Err(PlanError::Empty);
    }
    if subtasks.len() < config.min_subtasks {
        debug!(subtasks = subtasks.len(), min = config.min_subtasks, "Plan is smaller than requested");
    }

    let known: HashSet<String> = subtasks.iter().map(|task| task.id.clone()).collect();
    for task in &mut subtasks {
        let id = task.id.clone();
        task.depends_on.retain(|dep| dep != &id && known.contains(dep));
        let mut unique = HashSet::new();
        task.depends_on.retain(|dep| unique.insert(dep.clone()));
    }
    for (from, to) in prune_cycles(&mut subtasks) {
        warn!(from = %from, to = %to, "Removed dependency edge closing a cycle");
    }
    Ok(subtasks)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    OnStack,
    Done,
}

/// Removes back edges found by a depth-first search over `depends_on`,
/// leaving an acyclic graph. Returns the removed `(sub-task, dependency)`
/// edges.
pub fn prune_cycles(subtasks: &mut [SubTask]) -> Vec<(String, String)> {
    let index: HashMap<String, usize> = subtasks
        .iter()
        .enumerate()
        .map(|(position, task)| (task.id.clone(), position))
        .collect();
    let mut visits = vec![Visit::New; subtasks.len()];
    let mut removed = Vec::new();
    for start in 0..subtasks.len() {
        if visits[start] == Visit::New {
            visit(start, subtasks, &index, &mut visits, &mut removed);
        }
    }
    removed
}

fn visit(
    node: usize,
    subtasks: &mut [SubTask],
    index: &HashMap<String, usize>,
    visits: &mut [Visit],
    removed: &mut Vec<(String, String)>,
) {
    visits[node] = Visit::OnStack;
    let deps = std::mem::take(&mut subtasks[node].depends_on);
    let mut kept = Vec::with_capacity(deps.len());
    for dep in deps {
        let Some(&next) = index.get(&dep) else {
            continue;
        };
        match visits[next] {
            Visit::OnStack => removed.push((subtasks[node].id.clone(), dep)),
            Visit::New => {
                visit(next, subtasks, index, visits, removed);
                kept.push(dep);
            }
            Visit::Done => kept.push(dep),
        }
    }
    subtasks[node].depends_on = kept;
    visits[node] = Visit::Done;
}

fn extract_array(reply: &str) -> Option<&str> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    (end > start).then(|| &reply[start..=end])
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                None
            } else if text.chars().all(|c| c.is_ascii_digit()) {
                Some(format!("t{text}"))
            } else {
                Some(text.to_string())
            }
        }
        Value::Number(number) => Some(format!("t{number}")),
        _ => None,
    }
}

fn preview(reply: &str) -> String {
    crate::text::truncate(reply.trim(), 120)
}
