use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix used by the gateway for server-qualified MCP tool names
/// (`mcp_<server>_<tool>`).
pub const MCP_PREFIX: &str = "mcp_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Builtin,
    Plugin,
    Instruction,
    Mcp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub kind: ToolKind,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_schema")]
    pub input_schema: Value,
    /// Owning MCP server, when the tool comes from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, kind: ToolKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            input_schema: empty_schema(),
            server: None,
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn is_builtin(&self) -> bool {
        self.kind == ToolKind::Builtin
    }

    /// True when this tool is served by the MCP server `server_id`, either by
    /// explicit binding or by its qualified name.
    pub fn belongs_to_server(&self, server_id: &str) -> bool {
        if self.kind != ToolKind::Mcp {
            return false;
        }
        if self
            .server
            .as_deref()
            .is_some_and(|server| server.eq_ignore_ascii_case(server_id))
        {
            return true;
        }
        let qualified = format!("{MCP_PREFIX}{server_id}_");
        self.name.to_lowercase().starts_with(&qualified.to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

impl ToolStatus {
    pub fn is_success(self) -> bool {
        self == ToolStatus::Success
    }
}

/// One completed tool call inside a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub name: String,
    pub arguments: Value,
    pub status: ToolStatus,
    pub result: String,
    pub latency_ms: u64,
    pub order: usize,
}

impl ToolOutcome {
    pub fn succeeded(&self) -> bool {
        self.status.is_success()
    }
}
