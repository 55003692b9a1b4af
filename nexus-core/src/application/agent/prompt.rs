use tracing::warn;

use super::context::AgentContext;
use crate::application::memory::{SOP_MARKER, SkillMatch};
use crate::application::routing::render_scope_block;
use crate::config::ProtocolMode;
use crate::domain::{Fact, Scope, SopRecord, ToolDescriptor};

const MAX_FACTS: usize = 3;
const MAX_SKILLS: usize = 3;

/// Context gathered once per run and rendered into the system prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptSections {
    pub scope_block: Option<String>,
    pub sops: Vec<SopRecord>,
    pub skills: Vec<SkillMatch>,
    pub facts: Vec<Fact>,
    pub limitations: Option<String>,
}

impl PromptSections {
    pub async fn gather(ctx: &AgentContext, task: &str, scope: Option<&Scope>) -> Self {
        let scope_block = scope.map(|scope| {
            let rules = ctx.rules.render_rules(&scope.id);
            let insight = ctx.tracker.insight_block(&scope.id);
            render_scope_block(scope, rules.as_deref(), insight.as_deref())
        });
        let sops = ctx.memory.facts().find_sops(task).unwrap_or_else(|err| {
            warn!(error = %err, "SOP lookup failed");
            Vec::new()
        });
        let facts = ctx
            .memory
            .facts()
            .search(task, MAX_FACTS)
            .unwrap_or_else(|err| {
                warn!(error = %err, "Memory search failed");
                Vec::new()
            })
            .into_iter()
            .filter(|fact| !fact.text.contains(SOP_MARKER))
            .collect();
        Self {
            scope_block,
            sops,
            skills: ctx.memory.skills().lookup(task, MAX_SKILLS).await,
            facts,
            limitations: ctx.gaps.disclosure(),
        }
    }
}

pub fn system_prompt(protocol: ProtocolMode, tools: &[ToolDescriptor], sections: &PromptSections) -> String {
    let mut blocks = vec![protocol_instructions(protocol).to_string()];
    blocks.push(tool_list(protocol, tools));

    if let Some(scope) = &sections.scope_block {
        blocks.push(scope.clone());
    }
    if !sections.sops.is_empty() {
        let mut block = String::from("## Procedures that worked before");
        for sop in &sections.sops {
            block.push_str(&format!("\n- \"{}\": {}", sop.task, sop.steps.join(" → ")));
        }
        blocks.push(block);
    }
    if !sections.skills.is_empty() {
        let mut block = String::from("## Relevant skills");
        for skill in &sections.skills {
            block.push_str(&format!("\n- {} ({}): {}", skill.name, skill.path, skill.description));
        }
        blocks.push(block);
    }
    if !sections.facts.is_empty() {
        let mut block = String::from("## Remembered facts");
        for fact in &sections.facts {
            block.push_str(&format!("\n- {}", fact.text));
        }
        blocks.push(block);
    }
    if let Some(limitations) = &sections.limitations {
        blocks.push(limitations.clone());
    }
    blocks.join("\n\n")
}

fn protocol_instructions(protocol: ProtocolMode) -> &'static str {
    match protocol {
        ProtocolMode::Text => {
            "You are an autonomous assistant that solves requests step by step with tools.\n\
To call a tool, reply with a fenced block:\n\
```json\n{\"tool\": \"tool_name\", \"args\": {}}\n```\n\
Several independent calls may be sent as a JSON array inside one block.\n\
When the task is finished, reply with plain text or with \
{\"action\": \"final\", \"response\": \"...\"}.\n\
Answer in the user's language."
        }
        ProtocolMode::Native => {
            "You are an autonomous assistant that solves requests step by step with tools.\n\
Call the provided functions when you need a tool. When the task is finished, \
reply with plain text and no function call.\n\
Answer in the user's language."
        }
    }
}

fn tool_list(protocol: ProtocolMode, tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "No tools are available for this task.".to_string();
    }
    let mut block = String::from("## Available tools");
    for tool in tools {
        block.push_str(&format!("\n- {}", tool.name));
        if !tool.description.trim().is_empty() {
            block.push_str(&format!(": {}", tool.description.trim()));
        }
        if protocol == ProtocolMode::Text {
            block.push_str(&format!("\n  args schema: {}", tool.input_schema));
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ToolKind;
    use chrono::Utc;

    #[test]
    fn text_prompt_lists_schemas_and_sections() {
        let tools = vec![ToolDescriptor::new("readFile", ToolKind::Builtin, "Read a file")];
        let sections = PromptSections {
            sops: vec![SopRecord {
                task: "read config".into(),
                steps: vec!["listDir".into(), "readFile".into()],
                timestamp: Utc::now(),
            }],
            limitations: Some("## Known limitations\n- `ocr`: unknown tool".into()),
            ..PromptSections::default()
        };

        let prompt = system_prompt(ProtocolMode::Text, &tools, &sections);

        assert!(prompt.contains("```json"));
        assert!(prompt.contains("- readFile: Read a file"));
        assert!(prompt.contains("args schema"));
        assert!(prompt.contains("listDir → readFile"));
        assert!(prompt.contains("## Known limitations"));
    }

    #[test]
    fn native_prompt_omits_schemas() {
        let tools = vec![ToolDescriptor::new("readFile", ToolKind::Builtin, "Read a file")];
        let prompt = system_prompt(ProtocolMode::Native, &tools, &PromptSections::default());
        assert!(prompt.contains("provided functions"));
        assert!(!prompt.contains("args schema"));
    }
}
