use super::*;
use crate::application::approval::{ApprovalDecision, ApprovalGate, ApprovalRequest, AutoApprove};
use crate::config::PlannerConfig;
use crate::domain::{ChatMessage, PlanStatus, SubTask, SubTaskStatus, TaskPlan};
use crate::infrastructure::model::{ModelError, ModelGateway};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
struct RecordingRunner {
    failing: HashSet<String>,
    order: Mutex<Vec<String>>,
    succeeded: Mutex<HashSet<String>>,
    violations: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingRunner {
    fn failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    async fn order(&self) -> Vec<String> {
        self.order.lock().await.clone()
    }
}

#[async_trait]
impl SubTaskRunner for RecordingRunner {
    async fn run_subtask(&self, subtask: &SubTask, _prompt: &str) -> Result<String, PlanError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        {
            let succeeded = self.succeeded.lock().await;
            for dep in &subtask.depends_on {
                if !succeeded.contains(dep) {
                    self.violations
                        .lock()
                        .await
                        .push(format!("{} ran before {dep}", subtask.id));
                }
            }
        }
        self.order.lock().await.push(subtask.id.clone());
        tokio::task::yield_now().await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&subtask.id) {
            return Err(PlanError::sub_task(&subtask.id, "boom"));
        }
        self.succeeded.lock().await.insert(subtask.id.clone());
        Ok(format!("{} ok", subtask.id))
    }
}

struct FixedDecision(ApprovalDecision);

#[async_trait]
impl ApprovalGate for FixedDecision {
    async fn decide(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        self.0.clone()
    }
}

struct FixedModel(&'static str);

#[async_trait]
impl ModelGateway for FixedModel {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, ModelError> {
        Ok(self.0.to_string())
    }
}

const CHAIN: &str = r#"[{"id":"t1","dependsOn":[]},{"id":"t2","dependsOn":["t1"]},{"id":"t3","dependsOn":["t2","t1"]}]"#;

fn chain_plan() -> TaskPlan {
    let subtasks = parse_subtasks(CHAIN, &PlannerConfig::default()).expect("plan parses");
    TaskPlan::new("chain", subtasks)
}

fn executor(runner: Arc<RecordingRunner>, approval: Arc<dyn ApprovalGate>, max_parallel: usize) -> DagExecutor {
    DagExecutor::new(runner, approval, max_parallel)
}

/// Kahn's algorithm: true when every sub-task can be ordered.
fn is_acyclic(subtasks: &[SubTask]) -> bool {
    let mut remaining: HashMap<&str, usize> = subtasks
        .iter()
        .map(|task| (task.id.as_str(), task.depends_on.len()))
        .collect();
    let mut ordered = 0;
    loop {
        let free: Vec<&str> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        if free.is_empty() {
            break;
        }
        for id in free {
            remaining.remove(id);
            ordered += 1;
            for task in subtasks {
                if task.depends_on.iter().any(|dep| dep == id)
                    && let Some(count) = remaining.get_mut(task.id.as_str())
                {
                    *count -= 1;
                }
            }
        }
    }
    ordered == subtasks.len()
}

#[tokio::test]
async fn chain_runs_in_dependency_order() {
    let runner = Arc::new(RecordingRunner::default());
    let mut plan = chain_plan();

    let summary = executor(runner.clone(), Arc::new(AutoApprove), 3).execute(&mut plan).await;

    assert_eq!(runner.order().await, vec!["t1", "t2", "t3"]);
    assert_eq!(plan.status, PlanStatus::Done);
    assert!(summary.starts_with("Plan done: 3/3 sub-tasks done"));
    assert!(runner.violations.lock().await.is_empty());
}

#[tokio::test]
async fn failed_root_blocks_every_dependent() {
    let runner = Arc::new(RecordingRunner::failing(&["t1"]));
    let mut plan = chain_plan();

    let summary = executor(runner.clone(), Arc::new(AutoApprove), 3).execute(&mut plan).await;

    assert_eq!(plan.status, PlanStatus::Failed);
    assert_eq!(plan.status_of("t1"), Some(SubTaskStatus::Failed));
    assert_eq!(plan.status_of("t2"), Some(SubTaskStatus::Blocked));
    assert_eq!(plan.status_of("t3"), Some(SubTaskStatus::Blocked));
    assert_eq!(plan.get("t1").map(|task| task.retries), Some(1));
    assert_eq!(runner.order().await, vec!["t1", "t1"]);
    let reason = plan.get("t2").and_then(|task| task.blocked_reason.clone()).unwrap_or_default();
    assert!(reason.contains("t1"));
    assert!(summary.contains("- [blocked] t3"));
}

#[tokio::test]
async fn skipped_approval_still_satisfies_dependents() {
    let runner = Arc::new(RecordingRunner::default());
    let mut plan = chain_plan();
    plan.subtasks[1].approval_required = true;

    executor(runner.clone(), Arc::new(FixedDecision(ApprovalDecision::Skip)), 3)
        .execute(&mut plan)
        .await;

    assert_eq!(plan.status_of("t2"), Some(SubTaskStatus::Skipped));
    assert_eq!(plan.status_of("t3"), Some(SubTaskStatus::Done));
    assert_eq!(runner.order().await, vec!["t1", "t3"]);
    assert_eq!(plan.status, PlanStatus::Done);
}

#[tokio::test]
async fn cancelled_approval_stops_the_plan() {
    let runner = Arc::new(RecordingRunner::default());
    let mut plan = chain_plan();
    plan.subtasks[1].approval_required = true;

    let summary = executor(runner.clone(), Arc::new(FixedDecision(ApprovalDecision::Cancel)), 3)
        .execute(&mut plan)
        .await;

    assert_eq!(plan.status, PlanStatus::Cancelled);
    assert_eq!(runner.order().await, vec!["t1"]);
    assert!(summary.starts_with("Plan cancelled"));
}

#[tokio::test]
async fn independent_subtasks_respect_the_parallel_cap() {
    let runner = Arc::new(RecordingRunner::default());
    let subtasks = (1..=5).map(|n| SubTask::new(format!("t{n}"), "independent")).collect();
    let mut plan = TaskPlan::new("fan out", subtasks);

    executor(runner.clone(), Arc::new(AutoApprove), 2).execute(&mut plan).await;

    assert_eq!(runner.order().await.len(), 5);
    assert_eq!(runner.peak.load(Ordering::SeqCst), 2);
    assert_eq!(plan.status, PlanStatus::Done);
}

#[test]
fn parsing_drops_duplicates_and_bad_dependencies() {
    let reply = r#"Here is the plan:
[
  {"id": "t1", "description": "collect"},
  {"id": "t1", "description": "duplicate"},
  {"id": "t2", "description": "report", "depends_on": ["t2", "t9", "t1", "t1"]}
]"#;
    let subtasks = parse_subtasks(reply, &PlannerConfig::default()).expect("parses");

    assert_eq!(subtasks.len(), 2);
    assert_eq!(subtasks[0].description, "collect");
    assert_eq!(subtasks[1].depends_on, vec!["t1"]);
    assert_eq!(subtasks[1].max_retries, 1);
}

#[test]
fn numeric_ids_match_whether_quoted_or_not() {
    let reply = r#"[
  {"id": "1", "description": "fetch"},
  {"id": 2, "description": "summarize", "depends_on": [1]},
  {"id": "3", "description": "send", "depends_on": ["2", " 1 "]}
]"#;
    let subtasks = parse_subtasks(reply, &PlannerConfig::default()).expect("parses");

    let ids: Vec<&str> = subtasks.iter().map(|task| task.id.as_str()).collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);
    assert_eq!(subtasks[1].depends_on, vec!["t1"]);
    assert_eq!(subtasks[2].depends_on, vec!["t2", "t1"]);
}

#[test]
fn parsing_truncates_to_the_maximum() {
    let items: Vec<String> = (1..=12)
        .map(|n| format!(r#"{{"id":"t{n}","description":"step {n}"}}"#))
        .collect();
    let reply = format!("[{}]", items.join(","));

    let subtasks = parse_subtasks(&reply, &PlannerConfig::default()).expect("parses");

    assert_eq!(subtasks.len(), 10);
}

#[test]
fn cycles_are_broken() {
    let mut subtasks = vec![
        SubTask::new("a", "a").depends_on(["c"]),
        SubTask::new("b", "b").depends_on(["a"]),
        SubTask::new("c", "c").depends_on(["b"]),
    ];

    let removed = prune_cycles(&mut subtasks);

    assert_eq!(removed.len(), 1);
    assert!(is_acyclic(&subtasks));
}

#[tokio::test]
async fn unusable_plan_reply_falls_back_to_one_node() {
    let planner = TaskPlanner::new(
        Arc::new(FixedModel("I would rather not.")),
        PlannerConfig::default(),
        Duration::from_secs(5),
    );

    let plan = planner.plan("book a flight").await;

    assert_eq!(plan.subtasks.len(), 1);
    assert_eq!(plan.subtasks[0].id, "t1");
    assert_eq!(plan.subtasks[0].description, "book a flight");
}

#[tokio::test]
async fn random_dags_never_run_ahead_of_dependencies() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..60 {
        let size = rng.gen_range(3..=10);
        let ids: Vec<String> = (1..=size).map(|n| format!("t{n}")).collect();
        let mut subtasks: Vec<SubTask> = ids
            .iter()
            .map(|id| {
                let deps: Vec<String> = ids
                    .iter()
                    .filter(|other| *other != id && rng.gen_bool(0.25))
                    .cloned()
                    .collect();
                SubTask::new(id.clone(), "random").depends_on(deps)
            })
            .collect();
        prune_cycles(&mut subtasks);
        assert!(is_acyclic(&subtasks));

        let failing: Vec<&str> = ids
            .iter()
            .filter(|_| rng.gen_bool(0.2))
            .map(String::as_str)
            .collect();
        let runner = Arc::new(RecordingRunner::failing(&failing));
        let mut plan = TaskPlan::new("random", subtasks);
        let max_parallel = rng.gen_range(1..=4);

        executor(runner.clone(), Arc::new(AutoApprove), max_parallel)
            .execute(&mut plan)
            .await;

        assert!(runner.violations.lock().await.is_empty());
        assert!(runner.peak.load(Ordering::SeqCst) <= max_parallel);
        for task in &plan.subtasks {
            assert!(task.status.is_terminal(), "{} ended {:?}", task.id, task.status);
            let dead_dep = task
                .depends_on
                .iter()
                .any(|dep| plan.status_of(dep).is_some_and(SubTaskStatus::is_dead_end));
            if dead_dep {
                assert_eq!(task.status, SubTaskStatus::Blocked, "{} should be blocked", task.id);
            }
        }
    }
}
