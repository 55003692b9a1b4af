// Routing tests - scope scoring, tool assembly and the filtered tool set

mod common;

use common::{ScriptedModel, StubTools, call, config};
use nexus_core::Orchestrator;
use nexus_core::application::agent::RunOptions;
use nexus_core::application::routing::{MIN_ROUTE_SCORE, MatchReason, ScopeRouter, ToolAssembler, ToolSet, score_scope};
use nexus_core::domain::{Scope, ToolDescriptor, ToolKind, ToolStatus};
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

fn catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new("readFile", ToolKind::Builtin, "Read a file"),
        ToolDescriptor::new("mcp_github_create_issue", ToolKind::Mcp, "Open an issue"),
        ToolDescriptor::new("mcp_github_list_prs", ToolKind::Mcp, "List pull requests"),
        ToolDescriptor::new("sendEmail", ToolKind::Plugin, "Send an email message"),
        ToolDescriptor::new("webSearch", ToolKind::Plugin, "Search the web"),
        ToolDescriptor::new("calendarCreate", ToolKind::Plugin, "Create calendar events"),
    ]
}

fn scopes() -> Vec<Scope> {
    vec![
        Scope::new("dev", "Development")
            .with_triggers(["open an issue", "pull request"])
            .with_tools(["github"])
            .with_description("Track code changes and repository work"),
        Scope::new("mail", "Mail")
            .with_triggers(["inbox"])
            .with_tools(["outlook"])
            .with_description("Read and answer mail"),
    ]
}

#[test]
fn appending_words_never_lowers_a_score() {
    let requests = [
        "open an issue",
        "list every pull request",
        "check the inbox",
        "code review",
        "搜索今天的新闻",
        "",
    ];
    let extras = ["github", "inbox please", "repository changes", "and then mail it", "新闻"];
    for scope in &scopes() {
        for request in requests {
            let base = score_scope(scope, request);
            for extra in extras {
                let longer = format!("{request} {extra}");
                assert!(
                    score_scope(scope, &longer) >= base,
                    "score for {} dropped on '{longer}'",
                    scope.id
                );
            }
        }
    }
}

#[test]
fn trigger_phrase_routes_and_binds_server_tools() {
    let selection = ToolAssembler::new().prepare(&catalog(), &scopes(), "open an issue and email my team", None);

    assert_eq!(selection.scope.as_ref().map(|scope| scope.id.as_str()), Some("dev"));
    assert!(selection.filtered);
    assert!(selection.fuzzy);
    let names: Vec<&str> = selection.tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["readFile", "mcp_github_create_issue", "mcp_github_list_prs", "sendEmail"]
    );
}

#[test]
fn scope_without_usable_tools_keeps_the_full_catalog() {
    let selection = ToolAssembler::new().prepare(&catalog(), &scopes(), "check my inbox", None);

    assert_eq!(selection.scope.as_ref().map(|scope| scope.id.as_str()), Some("mail"));
    assert!(!selection.filtered);
    assert_eq!(selection.tools.len(), catalog().len());
}

#[test]
fn unmatched_requests_get_no_scope() {
    let router = ScopeRouter;
    assert!(router.route(&scopes(), "what is the weather", None).is_none());

    let pinned = router
        .route(&scopes(), "what is the weather", Some("mail"))
        .expect("pinned scope");
    assert_eq!(pinned.reason, MatchReason::Pinned);

    let scored = router
        .route(&scopes(), "review repository code changes", None)
        .expect("scored match");
    assert_eq!(scored.scope.id, "dev");
    assert!(scored.score >= MIN_ROUTE_SCORE);
}

#[test]
fn filtered_set_unlocks_after_two_failures() {
    let catalog = Arc::new(catalog());
    let selection = ToolAssembler::new().prepare(&catalog, &scopes(), "open an issue and email my team", None);
    let mut toolset = ToolSet::new(&selection, Arc::clone(&catalog));

    assert!(toolset.resolve_missing("calendarCreate"));
    assert!(toolset.contains("calendarCreate"));
    assert!(!toolset.resolve_missing("doesNotExist"));

    assert!(!toolset.note_outcome(false));
    assert!(!toolset.note_outcome(true));
    assert!(!toolset.note_outcome(false));
    assert!(toolset.note_outcome(false));
    assert!(!toolset.is_filtered());
    assert_eq!(toolset.tools().len(), catalog.len());
}

#[tokio::test]
async fn calls_outside_a_strict_filtered_set_are_not_forwarded() {
    let dir = tempdir().expect("tempdir");
    let scopes_path = dir.path().join("scopes.json");
    std::fs::write(
        &scopes_path,
        r#"[{"id": "dev", "label": "Development", "triggers": ["open an issue"], "tools": ["github"]}]"#,
    )
    .expect("write scopes");
    let extra = format!(
        "scopes_path = \"{}\"\n",
        scopes_path.display().to_string().replace('\\', "/")
    );
    let outside = call("calendarCreate", json!({"title": "sync"}));
    let model = ScriptedModel::new([outside.as_str(), outside.as_str(), outside.as_str(), "done"]);
    let tools = StubTools::default();
    let orchestrator = Orchestrator::new(
        config(dir.path(), &extra),
        Arc::new(model.clone()),
        Arc::new(tools.clone()),
    );
    orchestrator.reload_tools(catalog());

    let options = RunOptions {
        max_turns: Some(6),
        ..RunOptions::default()
    };
    let outcome = orchestrator.run_with("open an issue", options).await;

    assert_eq!(outcome.scope_id.as_deref(), Some("dev"));
    assert_eq!(outcome.response, "done");
    let statuses: Vec<ToolStatus> = outcome.trace.outcomes.iter().map(|record| record.status).collect();
    assert_eq!(statuses, vec![ToolStatus::Error, ToolStatus::Error, ToolStatus::Success]);
    assert!(outcome.trace.outcomes[0].result.contains("not found"));
    // Two not-found failures unlock the catalog, so only the third call reaches the gateway.
    assert_eq!(tools.calls().await.len(), 1);
}
