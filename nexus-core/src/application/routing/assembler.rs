use tracing::debug;

use super::router::{ScopeMatch, ScopeRouter};
use crate::domain::{Scope, ToolDescriptor};
use crate::text;

/// Below this many scope-specific tools the selection is topped up by
/// keyword similarity.
pub const MIN_SPECIFIC_TOOLS: usize = 3;
pub const MAX_FILTERED_TOOLS: usize = 15;

/// Result of `ToolAssembler::prepare`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSelection {
    pub tools: Vec<ToolDescriptor>,
    pub scope: Option<Scope>,
    /// True when `tools` is a subset of the catalog.
    pub filtered: bool,
    /// True when keyword matching contributed tools.
    pub fuzzy: bool,
}

impl ToolSelection {
    fn full(catalog: &[ToolDescriptor], scope: Option<Scope>) -> Self {
        Self {
            tools: catalog.to_vec(),
            scope,
            filtered: false,
            fuzzy: false,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ToolAssembler {
    router: ScopeRouter,
}

impl ToolAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, scopes: &[Scope], request: &str, pinned: Option<&str>) -> Option<ScopeMatch> {
        self.router.route(scopes, request, pinned)
    }

    pub fn prepare(
        &self,
        catalog: &[ToolDescriptor],
        scopes: &[Scope],
        request: &str,
        pinned: Option<&str>,
    ) -> ToolSelection {
        match self.route(scopes, request, pinned) {
            Some(hit) => self.assemble(catalog, hit.scope, request),
            None => ToolSelection::full(catalog, None),
        }
    }

    /// Builtins, the scope's bound tools and tools of its bound MCP servers.
    /// Falls back to the whole catalog when the scope binds nothing usable.
    pub fn assemble(&self, catalog: &[ToolDescriptor], scope: Scope, request: &str) -> ToolSelection {
        let bound = |tool: &ToolDescriptor| {
            scope.tools.iter().any(|id| {
                tool.name.eq_ignore_ascii_case(id) || tool.belongs_to_server(id)
            })
        };
        let mut tools: Vec<ToolDescriptor> = catalog
            .iter()
            .filter(|tool| tool.is_builtin() || bound(tool))
            .cloned()
            .collect();

        let specific = tools.iter().filter(|tool| !tool.is_builtin()).count();
        if specific == 0 {
            debug!(scope = %scope.id, "Scope binds no tools, using full catalog");
            return ToolSelection::full(catalog, Some(scope));
        }

        let mut fuzzy = false;
        if specific < MIN_SPECIFIC_TOOLS && tools.len() < MAX_FILTERED_TOOLS {
            let extra = fuzzy_supplement(catalog, &tools, request, MAX_FILTERED_TOOLS - tools.len());
            fuzzy = !extra.is_empty();
            tools.extend(extra);
        }
        debug!(
            scope = %scope.id,
            tools = tools.len(),
            fuzzy,
            "Assembled scoped tool set"
        );
        ToolSelection {
            tools,
            scope: Some(scope),
            filtered: true,
            fuzzy,
        }
    }
}

/// Catalog tools not yet selected whose name fragments or description share
/// words with the request, best first.
fn fuzzy_supplement(
    catalog: &[ToolDescriptor],
    selected: &[ToolDescriptor],
    request: &str,
    room: usize,
) -> Vec<ToolDescriptor> {
    let request_tokens = text::tokens(request);
    let mut scored: Vec<(usize, &ToolDescriptor)> = catalog
        .iter()
        .filter(|tool| !selected.iter().any(|chosen| chosen.name == tool.name))
        .filter_map(|tool| {
            let mut words = text::name_fragments(&tool.name);
            words.extend(
                text::tokens(&tool.description)
                    .into_iter()
                    .filter(|word| word.chars().count() >= 3),
            );
            let score = text::overlap(&request_tokens, &words);
            (score > 0).then_some((score, tool))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(room)
        .map(|(_, tool)| tool.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ToolKind;

    fn catalog() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new("readFile", ToolKind::Builtin, "Read a file"),
            ToolDescriptor::new("webSearch", ToolKind::Plugin, "Search the web"),
            ToolDescriptor::new("mcp_github_create_issue", ToolKind::Mcp, "Open an issue"),
            ToolDescriptor::new("list_prs", ToolKind::Mcp, "List pull requests").with_server("github"),
            ToolDescriptor::new("translate", ToolKind::Plugin, "Translate text to another language"),
            ToolDescriptor::new("sendMail", ToolKind::Plugin, "Send an email"),
        ]
    }

    fn names(selection: &ToolSelection) -> Vec<&str> {
        selection.tools.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn mcp_server_binding_pulls_prefixed_and_owned_tools() {
        let scope = Scope::new("gh", "GitHub").with_tools(["github", "webSearch"]);
        let selection = ToolAssembler::new().assemble(&catalog(), scope, "open an issue");
        assert!(selection.filtered);
        assert!(!selection.fuzzy);
        assert_eq!(
            names(&selection),
            vec!["readFile", "webSearch", "mcp_github_create_issue", "list_prs"]
        );
    }

    #[test]
    fn sparse_scope_gets_fuzzy_supplement() {
        let scope = Scope::new("lang", "Language").with_tools(["webSearch"]);
        let selection = ToolAssembler::new().assemble(&catalog(), scope, "translate this text and send email");
        assert!(selection.fuzzy);
        let names = names(&selection);
        assert!(names.contains(&"translate"));
        assert!(names.contains(&"sendMail"));
        assert!(names.len() <= MAX_FILTERED_TOOLS);
    }

    #[test]
    fn empty_binding_falls_back_to_full_catalog() {
        let scope = Scope::new("empty", "Nothing").with_tools(["does_not_exist"]);
        let selection = ToolAssembler::new().assemble(&catalog(), scope, "anything");
        assert!(!selection.filtered);
        assert_eq!(selection.tools.len(), catalog().len());
        assert_eq!(selection.scope.map(|s| s.id), Some("empty".to_string()));
    }

    #[test]
    fn unmatched_request_keeps_full_catalog() {
        let selection = ToolAssembler::new().prepare(&catalog(), &[], "hello", None);
        assert!(selection.scope.is_none());
        assert!(!selection.filtered);
    }
}
