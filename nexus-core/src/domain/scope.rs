use serde::{Deserialize, Serialize};

/// A behavioral context ("Nexus") narrowing tools and prompting for a class
/// of requests. Owned outside the core; loaded read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub sop: String,
    #[serde(default = "fully_configured")]
    pub progress: f32,
}

fn fully_configured() -> f32 {
    1.0
}

impl Scope {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: String::new(),
            triggers: Vec::new(),
            tools: Vec::new(),
            objective: String::new(),
            metrics: Vec::new(),
            sop: String::new(),
            progress: 1.0,
        }
    }

    pub fn with_triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers = triggers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = progress;
        self
    }

    /// Only fully constructed scopes take part in routing.
    pub fn is_routable(&self) -> bool {
        self.progress >= 1.0
    }
}
