//! The per-task execution loop and its collaborators.
//!
//! # Structure
//! - `execution` - `ExecutionLoop`: model turns, tool calls, validation, escalation
//! - `parser` - text-protocol call extraction cascade
//! - `budget` - tiered turn budgets
//! - `safety` - risk gate and critic instructions
//! - `reflexion` - per-task failure memory
//! - `gaps` - persisted capability gaps
//! - `prompt` - system prompt assembly
//! - `events` - step events and cancellation

mod budget;
mod context;
mod error;
mod events;
mod execution;
mod gaps;
pub mod parser;
mod prompt;
mod reflexion;
mod safety;


pub use budget::{BudgetTier, turn_budget};
pub use context::{AgentContext, GAPS_FILE, RULES_FILE, STATS_FILE};
pub use error::AgentError;
pub use events::{CancelHandle, EventSink, StepEvent, StepKind};
pub use execution::{AgentOutcome, ExecutionLoop, RunOptions, RunStatus};
pub use gaps::{CapabilityGap, CapabilityGapLog, is_gap_error};
pub use parser::{CallExtractor, CallParser, ParsedTurn, ToolCall};
pub use prompt::{PromptSections, system_prompt};
pub use reflexion::{MAX_IDENTICAL_FAILURES, Reflection, ReflexionTracker, refusal_message};
pub use safety::{RiskGate, is_mutating, verification_instruction};
