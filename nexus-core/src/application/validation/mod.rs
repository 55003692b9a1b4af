//! Completion judging and turn-budget escalation.

mod escalation;
mod report;
mod validator;

pub use escalation::{EscalationDecision, Escalator, partial_completion_report};
pub use report::{ValidationReport, heuristic_report};
pub use validator::CompletionValidator;
