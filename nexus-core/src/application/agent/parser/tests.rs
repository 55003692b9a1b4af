use super::*;
use serde_json::json;

fn parse(text: &str) -> ParsedTurn {
    CallParser::default().parse(text)
}

fn single_call(turn: ParsedTurn) -> ToolCall {
    match turn {
        ParsedTurn::Calls(mut calls) if calls.len() == 1 => calls.remove(0),
        other => panic!("expected one call, got {other:?}"),
    }
}

#[test]
fn strict_json_block_with_args() {
    let call = single_call(parse(
        "Let me look.\n```json\n{\"tool\": \"readFile\", \"args\": {\"path\": \"a.txt\"}}\n```",
    ));
    assert_eq!(call.name, "readFile");
    assert_eq!(call.arguments, json!({"path": "a.txt"}));
}

#[test]
fn tool_call_label_with_array_of_calls() {
    let turn = parse(
        "```tool_call\n[{\"name\": \"a\", \"arguments\": {}}, {\"tool\": \"b\", \"input\": {\"x\": 1}}]\n```",
    );
    let ParsedTurn::Calls(calls) = turn else {
        panic!("expected calls");
    };
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].arguments, json!({"x": 1}));
}

#[test]
fn unlabeled_block_is_second_tier() {
    let call = single_call(parse("```\n{\"tool\": \"webSearch\", \"args\": {\"q\": \"rust\"}}\n```"));
    assert_eq!(call.name, "webSearch");
}

#[test]
fn inline_body_and_stringified_arguments() {
    let call = single_call(parse(
        r#"{"name": "runCmd", "arguments": "{\"cmd\": \"ls\"}"}"#,
    ));
    assert_eq!(call.arguments, json!({"cmd": "ls"}));
}

#[test]
fn free_position_object_inside_prose() {
    let call = single_call(parse(
        "I will now call {\"tool\": \"listDir\", \"args\": {\"path\": \"{root}\"}} and report back.",
    ));
    assert_eq!(call.name, "listDir");
    assert_eq!(call.arguments, json!({"path": "{root}"}));
}

#[test]
fn legacy_tags() {
    let call = single_call(parse("<tool_call>{\"name\": \"x\", \"args\": {}}</tool_call>"));
    assert_eq!(call.name, "x");

    let call = single_call(parse("<tool name=\"fetch\">{\"url\": \"https://a\"}</tool>"));
    assert_eq!(call.name, "fetch");
    assert_eq!(call.arguments, json!({"url": "https://a"}));
}

#[test]
fn salvage_recovers_from_unbalanced_json() {
    let call = single_call(parse(r#"{"tool": "readFile", "args": {"path": "notes.md"}"#));
    assert_eq!(call.name, "readFile");
    assert_eq!(call.arguments, json!({"path": "notes.md"}));
}

#[test]
fn final_directive_is_an_answer() {
    assert_eq!(
        parse(r#"{"action": "final", "response": "All done."}"#),
        ParsedTurn::Final("All done.".into())
    );
    assert_eq!(
        parse(r#"{"action":"final","response":"broken \"quote\" here""#),
        ParsedTurn::Final("broken \"quote\" here".into())
    );
}

#[test]
fn ordinary_json_and_prose_are_plain() {
    assert_eq!(parse("  The answer is 42. "), ParsedTurn::Plain("The answer is 42.".into()));
    assert!(matches!(
        parse("```json\n{\"name\": \"Ada\", \"born\": 1815}\n```"),
        ParsedTurn::Plain(_)
    ));
}

#[test]
fn custom_extractors_run_before_salvage() {
    struct Bang;
    impl CallExtractor for Bang {
        fn name(&self) -> &'static str {
            "bang"
        }
        fn extract(&self, text: &str) -> Option<Extraction> {
            let name = text.strip_prefix('!')?;
            Some(Extraction::Calls(vec![ToolCall::new(name.trim(), json!({}))]))
        }
    }

    let parser = CallParser::default().with_extractor(Box::new(Bang));
    let names = parser.extractor_names();
    assert_eq!(names[names.len() - 2], "bang");
    assert_eq!(names[names.len() - 1], "regex_salvage");
    assert!(matches!(parser.parse("!status"), ParsedTurn::Calls(_)));
}
