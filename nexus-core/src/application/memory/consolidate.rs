use serde_json::Value;
use tracing::{debug, info};

use super::error::MemoryError;
use super::facts::FactStore;
use crate::domain::{ChatMessage, DayLogEntry, Fact};
use crate::infrastructure::model::ModelGateway;

pub const CONSOLIDATED_TAG: &str = "auto-consolidated";
const MAX_FACTS: usize = 3;

const PROMPT: &str = "You maintain an assistant's long-term memory. From the log below, \
extract between one and three durable facts worth remembering across sessions \
(user preferences, environment details, recurring outcomes). Reply with a JSON array \
of short strings and nothing else.";

/// Distils recent day-log entries into up to three durable facts.
pub async fn consolidate(
    model: &dyn ModelGateway,
    facts: &FactStore,
    entries: &[DayLogEntry],
) -> Result<Vec<Fact>, MemoryError> {
    if entries.is_empty() {
        return Ok(Vec::new());
    }
    let log = entries
        .iter()
        .map(|entry| {
            format!(
                "[{}] [{}] {}",
                entry.timestamp.format("%H:%M:%S"),
                entry.category.as_str(),
                entry.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let messages = [ChatMessage::system(PROMPT), ChatMessage::user(log)];
    let reply = model.complete(&messages).await?;
    let extracted = parse_fact_list(&reply).ok_or(MemoryError::NoFacts)?;
    debug!(count = extracted.len(), "Consolidation produced facts");

    let tags = [CONSOLIDATED_TAG.to_string()];
    let mut stored = Vec::with_capacity(extracted.len());
    for text in extracted {
        stored.push(facts.add(&text, &tags)?);
    }
    info!(facts = stored.len(), "Day log consolidated");
    Ok(stored)
}

/// First JSON array of strings in `reply`, trimmed to the fact cap.
fn parse_fact_list(reply: &str) -> Option<Vec<String>> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end <= start {
        return None;
    }
    let values: Vec<Value> = serde_json::from_str(&reply[start..=end]).ok()?;
    let facts: Vec<String> = values
        .into_iter()
        .filter_map(|value| match value {
            Value::String(text) => Some(text.trim().to_string()),
            _ => None,
        })
        .filter(|text| !text.is_empty())
        .take(MAX_FACTS)
        .collect();
    (!facts.is_empty()).then_some(facts)
}
