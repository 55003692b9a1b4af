//! Per-scope execution statistics and the insight block rendered into
//! prompts.

mod insight;
mod tracker;

pub use insight::render_insight;
pub use tracker::{MAX_ERROR_SNIPPETS, PerformanceTracker};
