use super::report::ValidationReport;
use crate::config::AgentConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum EscalationDecision {
    /// Continue the loop with more turns and a corrective instruction.
    Resume { extra_turns: u32, instruction: String },
    Stop,
}

/// Decides whether an unfinished run earns another turn allotment.
#[derive(Debug, Clone, Copy)]
pub struct Escalator {
    pub max_escalations: u32,
    pub skip_threshold: u8,
    pub extra_turns: u32,
}

impl Escalator {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_escalations: config.max_escalations,
            skip_threshold: config.escalation_skip_threshold,
            extra_turns: config.escalation_turns,
        }
    }

    pub fn decide(&self, report: &ValidationReport, escalations: u32) -> EscalationDecision {
        if report.completed
            || report.completion_rate >= self.skip_threshold
            || escalations >= self.max_escalations
        {
            return EscalationDecision::Stop;
        }
        EscalationDecision::Resume {
            extra_turns: self.extra_turns,
            instruction: corrective_instruction(report, escalations + 1, self.max_escalations),
        }
    }
}

fn corrective_instruction(report: &ValidationReport, attempt: u32, max: u32) -> String {
    let mut text = format!(
        "The task is only about {}% complete (review {attempt}/{max}). {}",
        report.completion_rate,
        report.summary.trim()
    );
    if let Some(reason) = &report.failure_reason {
        text.push_str(&format!("\nWhat went wrong: {reason}"));
    }
    if !report.pending_steps.is_empty() {
        text.push_str(&format!("\nStill pending: {}", report.pending_steps.join("; ")));
    }
    if !report.next_steps.is_empty() {
        text.push_str(&format!("\nSuggested next steps: {}", report.next_steps.join("; ")));
    }
    text.push_str("\nContinue working on the remaining steps. Do not redo finished work.");
    text
}

/// Text returned to the user when the run stops short of completion.
pub fn partial_completion_report(report: &ValidationReport, last_output: &str) -> String {
    let mut lines = vec![format!(
        "Partially completed ({}%). {}",
        report.completion_rate,
        report.summary.trim()
    )];
    if !report.completed_steps.is_empty() {
        lines.push(format!("Done: {}", report.completed_steps.join(", ")));
    }
    if !report.pending_steps.is_empty() {
        lines.push(format!("Not done: {}", report.pending_steps.join(", ")));
    }
    if let Some(reason) = &report.failure_reason {
        lines.push(format!("Reason: {reason}"));
    }
    if !report.next_steps.is_empty() {
        lines.push(format!("Next steps: {}", report.next_steps.join("; ")));
    }
    if !last_output.trim().is_empty() {
        lines.push(String::new());
        lines.push(last_output.trim().to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(rate: u8) -> ValidationReport {
        ValidationReport {
            completed: false,
            completion_rate: rate,
            summary: "Half done.".into(),
            completed_steps: vec!["search".into()],
            pending_steps: vec!["write summary".into()],
            failure_reason: None,
            next_steps: Vec::new(),
        }
    }

    #[test]
    fn low_rate_resumes_until_cap() {
        let escalator = Escalator::from_config(&AgentConfig::default());
        for escalations in 0..3 {
            match escalator.decide(&report(40), escalations) {
                EscalationDecision::Resume { extra_turns, instruction } => {
                    assert_eq!(extra_turns, 10);
                    assert!(instruction.contains("40%"));
                    assert!(instruction.contains("write summary"));
                }
                EscalationDecision::Stop => panic!("expected resume at {escalations}"),
            }
        }
        assert_eq!(escalator.decide(&report(40), 3), EscalationDecision::Stop);
    }

    #[test]
    fn confident_or_completed_reports_stop() {
        let escalator = Escalator::from_config(&AgentConfig::default());
        assert_eq!(escalator.decide(&report(80), 0), EscalationDecision::Stop);
        let mut done = report(10);
        done.completed = true;
        assert_eq!(escalator.decide(&done, 0), EscalationDecision::Stop);
    }

    #[test]
    fn partial_report_lists_progress() {
        let text = partial_completion_report(&report(40), "draft text");
        assert!(text.starts_with("Partially completed (40%)."));
        assert!(text.contains("Not done: write summary"));
        assert!(text.ends_with("draft text"));
    }
}
