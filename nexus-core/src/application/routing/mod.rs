//! Scope selection and per-task tool filtering.
//!
//! # Structure
//! - `router` - picks the scope for a request
//! - `assembler` - builds the filtered tool list for that scope
//! - `toolset` - per-task tool list that can widen at runtime
//! - `context` - scope section of the system prompt

mod assembler;
mod context;
mod router;
mod toolset;

pub use assembler::{MAX_FILTERED_TOOLS, MIN_SPECIFIC_TOOLS, ToolAssembler, ToolSelection};
pub use context::render_scope_block;
pub use router::{MIN_ROUTE_SCORE, MatchReason, ScopeMatch, ScopeRouter, TRIGGER_WEIGHT, score_scope};
pub use toolset::{FAILURES_BEFORE_UNLOCK, ToolSet};
