//! Self-tuning behavioral rules derived from performance statistics.
//!
//! # Structure
//! - `generators` - six pure rule generators over a `PerformanceStat`
//! - `engine` - activation, dedup, cooldown, expiry and persistence

mod engine;
mod generators;

pub use engine::{RuleBook, RuleEngine};
pub use generators::{Candidate, generate_all};
