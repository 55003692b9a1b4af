use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::report::{ValidationReport, heuristic_report};
use crate::domain::{ChatMessage, ExecutionTrace};
use crate::infrastructure::model::ModelGateway;
use crate::text;

const RESULT_PREVIEW_CHARS: usize = 300;
const MAX_TRACE_LINES: usize = 30;

const INSTRUCTIONS: &str = "You review whether an assistant finished a user's request. \
Score completion from 0 to 100 and reply with JSON only: \
{\"completed\": bool, \"completionRate\": 0-100, \"summary\": string, \
\"completedSteps\": [string], \"pendingSteps\": [string], \
\"failureReason\": string|null, \"nextSteps\": [string]}";

/// Asks the model to judge a finished run. Never fails: unreachable models
/// and unparseable replies fall back to `heuristic_report`.
pub struct CompletionValidator {
    model: Arc<dyn ModelGateway>,
    timeout: Duration,
}

impl CompletionValidator {
    pub fn new(model: Arc<dyn ModelGateway>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub async fn validate(
        &self,
        request: &str,
        trace: &ExecutionTrace,
        last_result: &str,
        metrics: &[String],
    ) -> ValidationReport {
        let messages = [
            ChatMessage::system(INSTRUCTIONS),
            ChatMessage::user(evaluation_prompt(request, trace, last_result, metrics)),
        ];
        let reply = match tokio::time::timeout(self.timeout, self.model.complete(&messages)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                warn!(error = %err, "Validator model call failed, using heuristic");
                return heuristic_report(trace);
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Validator model call timed out, using heuristic");
                return heuristic_report(trace);
            }
        };
        match extract_json(&reply).and_then(|json| ValidationReport::from_json(&json)) {
            Some(report) => {
                debug!(rate = report.completion_rate, completed = report.completed, "Validator verdict");
                report
            }
            None => {
                debug!("Validator reply unparseable, using heuristic");
                heuristic_report(trace)
            }
        }
    }
}

fn evaluation_prompt(request: &str, trace: &ExecutionTrace, last_result: &str, metrics: &[String]) -> String {
    let mut prompt = format!("## Request\n{request}\n\n## Tool calls\n");
    if trace.outcomes.is_empty() {
        prompt.push_str("(none)\n");
    }
    for outcome in trace.outcomes.iter().rev().take(MAX_TRACE_LINES).rev() {
        prompt.push_str(&format!(
            "{}. {} [{}] {}\n",
            outcome.order + 1,
            outcome.name,
            if outcome.succeeded() { "ok" } else { "error" },
            text::truncate(&outcome.result.replace('\n', " "), RESULT_PREVIEW_CHARS)
        ));
    }
    if !metrics.is_empty() {
        prompt.push_str("\n## Acceptance criteria\n");
        for metric in metrics {
            prompt.push_str(&format!("- {metric}\n"));
        }
    }
    prompt.push_str(&format!(
        "\n## Last output\n{}",
        text::truncate(last_result, RESULT_PREVIEW_CHARS * 2)
    ));
    prompt
}

/// JSON object from a reply that may wrap it in a fenced block or prose.
fn extract_json(reply: &str) -> Option<String> {
    let trimmed = reply.trim();
    for marker in ["```json", "```"] {
        if let Some(start) = trimmed.find(marker) {
            let body = &trimmed[start + marker.len()..];
            if let Some(end) = body.find("```") {
                return Some(body[..end].trim().to_string());
            }
        }
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| trimmed[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ToolStatus, TraceBuilder};
    use crate::infrastructure::model::ModelError;
    use async_trait::async_trait;
    use serde_json::json;

    struct Reply(Result<&'static str, ()>);

    #[async_trait]
    impl ModelGateway for Reply {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, ModelError> {
            self.0
                .map(str::to_string)
                .map_err(|_| ModelError::Unavailable("down".into()))
        }
    }

    fn trace() -> ExecutionTrace {
        let mut builder = TraceBuilder::new("write report", None);
        builder.record("writeFile", json!({}), ToolStatus::Success, "ok", 1);
        builder.record("runCmd", json!({}), ToolStatus::Error, "exit 1", 1);
        builder.seal()
    }

    fn validator(reply: Result<&'static str, ()>) -> CompletionValidator {
        CompletionValidator::new(Arc::new(Reply(reply)), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn fenced_verdict_is_parsed() {
        let reply = "Verdict:\n```json\n{\"completed\":false,\"completionRate\":40,\"summary\":\"half\"}\n```";
        let report = validator(Ok(reply)).validate("write report", &trace(), "", &[]).await;
        assert_eq!(report.completion_rate, 40);
        assert_eq!(report.summary, "half");
    }

    #[tokio::test]
    async fn garbage_and_errors_fall_back_to_heuristic() {
        let report = validator(Ok("looks fine to me")).validate("r", &trace(), "", &[]).await;
        assert_eq!(report.completion_rate, 50);

        let report = validator(Err(())).validate("r", &trace(), "", &[]).await;
        assert_eq!(report.completion_rate, 50);
    }

    #[test]
    fn prompt_lists_calls_and_metrics() {
        let prompt = evaluation_prompt("write report", &trace(), "done", &["file exists".into()]);
        assert!(prompt.contains("2. runCmd [error] exit 1"));
        assert!(prompt.contains("- file exists"));
    }
}
