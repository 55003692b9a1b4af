// Escalation scenario tests - validator verdicts drive resume or stop

mod common;

use common::{ScriptedModel, StubTools, call, config};
use nexus_core::application::agent::{RunOptions, RunStatus};
use nexus_core::domain::MessageRole;
use nexus_core::Orchestrator;
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

const ESCALATE_FAST: &str = "[agent]\nescalation_turns = 1\n\n[tool_gateway]\nmax_retries = 0\n";

fn one_turn() -> RunOptions {
    RunOptions {
        max_turns: Some(1),
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn rate_forty_escalates_three_times_then_reports_partial() {
    let dir = tempdir().expect("tempdir");
    let step = call("step", json!({"n": 1}));
    let verdict = r#"{"completed": false, "completionRate": 40, "summary": "Two of five steps done.", "pendingSteps": ["step 3"]}"#;
    let script: Vec<&str> = (0..4).flat_map(|_| [step.as_str(), verdict]).collect();
    let model = ScriptedModel::new(script);
    let tools = StubTools::default();
    let orchestrator = Orchestrator::new(
        config(dir.path(), ESCALATE_FAST),
        Arc::new(model.clone()),
        Arc::new(tools.clone()),
    );

    let outcome = orchestrator.run_with("migrate every table", one_turn()).await;

    assert_eq!(outcome.status, RunStatus::Partial);
    assert_eq!(outcome.escalations, 3);
    assert_eq!(tools.calls().await.len(), 4);
    assert!(outcome.response.contains("40%"));
    assert_eq!(outcome.validation.map(|report| report.completion_rate), Some(40));

    let requests = model.requests().await;
    assert_eq!(requests.len(), 8);
    let resumed = requests[2]
        .iter()
        .rev()
        .find(|message| message.role == MessageRole::User)
        .map(|message| message.content.clone())
        .unwrap_or_default();
    assert!(resumed.contains("review 1/3"));
}

#[tokio::test]
async fn completed_verdict_finishes_the_run() {
    let dir = tempdir().expect("tempdir");
    let step = call("step", json!({}));
    let verdict = r#"{"completed": true, "completionRate": 100, "summary": "All done."}"#;
    let model = ScriptedModel::new([step.as_str(), verdict]);
    let orchestrator = Orchestrator::new(
        config(dir.path(), ESCALATE_FAST),
        Arc::new(model.clone()),
        Arc::new(StubTools::default()),
    );

    let outcome = orchestrator.run_with("migrate every table", one_turn()).await;

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.escalations, 0);
}

#[tokio::test]
async fn unreadable_verdict_falls_back_to_the_trace() {
    let dir = tempdir().expect("tempdir");
    let step = call("step", json!({}));
    let model = ScriptedModel::new([step.as_str(), "I think it went fine?"]);
    let orchestrator = Orchestrator::new(
        config(dir.path(), ESCALATE_FAST),
        Arc::new(model.clone()),
        Arc::new(StubTools::default()),
    );

    let outcome = orchestrator.run_with("migrate every table", one_turn()).await;

    let report = outcome.validation.expect("validation report");
    assert_eq!(report.completion_rate, 100);
    assert_eq!(outcome.escalations, 0);
}

#[tokio::test]
async fn partial_run_keeps_trace_success_from_tool_outcomes() {
    let dir = tempdir().expect("tempdir");
    let step = call("step", json!({"n": 1}));
    let verdict = r#"{"completed": false, "completionRate": 85, "summary": "Nearly there."}"#;
    let model = ScriptedModel::new([step.as_str(), verdict]);
    let orchestrator = Orchestrator::new(
        config(dir.path(), ESCALATE_FAST),
        Arc::new(model.clone()),
        Arc::new(StubTools::default()),
    );

    let outcome = orchestrator.run_with("migrate every table", one_turn()).await;

    assert_eq!(outcome.status, RunStatus::Partial);
    assert_eq!(outcome.trace.outcomes.len(), 1);
    assert!(outcome.trace.outcomes.iter().all(|record| record.succeeded()));
    assert!(outcome.trace.success);
}
