//! Text-protocol tool call extraction.
//!
//! Extractors are tried in order; the first that recognises a call or a
//! final-answer directive wins. Text nothing recognises is the answer.

mod fenced;
mod inline;
mod json;
mod salvage;
mod tags;

pub use fenced::{StrictBlock, UnlabeledBlock};
pub use inline::{FreePosition, InlineBody};
pub use salvage::RegexSalvage;
pub use tags::LegacyTags;

use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// What one extractor recognised.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Calls(Vec<ToolCall>),
    Final(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedTurn {
    Calls(Vec<ToolCall>),
    /// Explicit `{"action":"final","response":...}` directive.
    Final(String),
    /// No call found; the text is the answer.
    Plain(String),
}

pub trait CallExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, text: &str) -> Option<Extraction>;
}

pub struct CallParser {
    extractors: Vec<Box<dyn CallExtractor>>,
}

impl Default for CallParser {
    fn default() -> Self {
        Self::new(vec![
            Box::new(StrictBlock),
            Box::new(UnlabeledBlock),
            Box::new(InlineBody),
            Box::new(FreePosition),
            Box::new(LegacyTags),
            Box::new(RegexSalvage),
        ])
    }
}

impl CallParser {
    pub fn new(extractors: Vec<Box<dyn CallExtractor>>) -> Self {
        Self { extractors }
    }

    /// Inserts an extractor ahead of the regex salvage pass.
    pub fn with_extractor(mut self, extractor: Box<dyn CallExtractor>) -> Self {
        let position = self
            .extractors
            .iter()
            .position(|existing| existing.name() == RegexSalvage.name())
            .unwrap_or(self.extractors.len());
        self.extractors.insert(position, extractor);
        self
    }

    pub fn extractor_names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    pub fn parse(&self, text: &str) -> ParsedTurn {
        for extractor in &self.extractors {
            match extractor.extract(text) {
                Some(Extraction::Calls(calls)) if !calls.is_empty() => {
                    debug!(extractor = extractor.name(), calls = calls.len(), "Tool calls extracted");
                    return ParsedTurn::Calls(calls);
                }
                Some(Extraction::Final(answer)) => {
                    debug!(extractor = extractor.name(), "Final directive extracted");
                    return ParsedTurn::Final(answer);
                }
                _ => {}
            }
        }
        ParsedTurn::Plain(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests;
