use std::sync::Arc;
use tracing::info;

use super::assembler::ToolSelection;
use crate::domain::ToolDescriptor;

/// Consecutive failures under a filtered set before the full catalog is
/// unlocked for the rest of the task.
pub const FAILURES_BEFORE_UNLOCK: u32 = 2;

/// The tools offered to the model during one task.
#[derive(Debug, Clone)]
pub struct ToolSet {
    catalog: Arc<Vec<ToolDescriptor>>,
    active: Vec<ToolDescriptor>,
    filtered: bool,
    fuzzy: bool,
    consecutive_failures: u32,
}

impl ToolSet {
    pub fn new(selection: &ToolSelection, catalog: Arc<Vec<ToolDescriptor>>) -> Self {
        Self {
            catalog,
            active: selection.tools.clone(),
            filtered: selection.filtered,
            fuzzy: selection.fuzzy,
            consecutive_failures: 0,
        }
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.active
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    pub fn contains(&self, name: &str) -> bool {
        self.active.iter().any(|tool| tool.name == name)
    }

    /// Adds `name` from the catalog when a fuzzy-filtered set missed it.
    /// Returns true if the tool is now available.
    pub fn resolve_missing(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return true;
        }
        if !self.fuzzy {
            return false;
        }
        let Some(tool) = self.catalog.iter().find(|tool| tool.name == name) else {
            return false;
        };
        info!(tool = name, "Adding tool missed by the filtered set");
        self.active.push(tool.clone());
        true
    }

    /// Tracks call outcomes. Returns true when this failure unlocked the
    /// full catalog.
    pub fn note_outcome(&mut self, success: bool) -> bool {
        if success {
            self.consecutive_failures = 0;
            return false;
        }
        self.consecutive_failures += 1;
        if self.filtered && self.consecutive_failures >= FAILURES_BEFORE_UNLOCK {
            info!(
                failures = self.consecutive_failures,
                "Unlocking the full tool catalog"
            );
            self.active = self.catalog.as_ref().clone();
            self.filtered = false;
            self.fuzzy = false;
            return true;
        }
        false
    }
}
