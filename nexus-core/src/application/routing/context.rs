use crate::domain::Scope;

/// Scope section of the system prompt: objective, procedure, acceptance
/// metrics, then any learned rules and performance insight.
pub fn render_scope_block(scope: &Scope, rules: Option<&str>, insight: Option<&str>) -> String {
    let mut sections = vec![format!("# Active scope: {} ({})", scope.label, scope.id)];
    if !scope.description.trim().is_empty() {
        sections.push(scope.description.trim().to_string());
    }
    if !scope.objective.trim().is_empty() {
        sections.push(format!("## Objective\n{}", scope.objective.trim()));
    }
    if !scope.sop.trim().is_empty() {
        sections.push(format!("## Procedure\n{}", scope.sop.trim()));
    }
    if !scope.metrics.is_empty() {
        let metrics: Vec<String> = scope.metrics.iter().map(|m| format!("- {m}")).collect();
        sections.push(format!("## Acceptance criteria\n{}", metrics.join("\n")));
    }
    sections.extend(rules.map(str::to_string));
    sections.extend(insight.map(str::to_string));
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_includes_only_present_sections() {
        let mut scope = Scope::new("web", "Web research");
        scope.objective = "Answer with sources".into();
        scope.metrics = vec!["cites two sources".into()];

        let block = render_scope_block(&scope, Some("## Learned rules\n- be brief"), None);
        assert!(block.starts_with("# Active scope: Web research (web)"));
        assert!(block.contains("## Objective\nAnswer with sources"));
        assert!(block.contains("- cites two sources"));
        assert!(block.contains("- be brief"));
        assert!(!block.contains("## Procedure"));
    }
}
