//! Plain data carried between the execution-core components.

pub mod memory;
pub mod plan;
pub mod rule;
pub mod scope;
pub mod stats;
pub mod tool;
pub mod trace;
pub mod types;

pub use memory::{DayLogEntry, Fact, LogCategory, SkillEntry, SkillVector, SopRecord};
pub use plan::{PlanStatus, SubTask, SubTaskStatus, TaskPlan};
pub use rule::{BehaviorRule, RuleTrigger, RuleType};
pub use scope::Scope;
pub use stats::{ErrorSnippet, PerformanceStat, ToolUsage};
pub use tool::{ToolDescriptor, ToolKind, ToolOutcome, ToolStatus};
pub use trace::{ExecutionTrace, TraceBuilder};
pub use types::{ChatMessage, FunctionCall, MessageRole};
