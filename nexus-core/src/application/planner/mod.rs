//! Request decomposition into a sub-task DAG and its wave-by-wave
//! execution.

mod decompose;
mod error;
mod executor;

#[cfg(test)]
mod tests;

pub use decompose::{TaskPlanner, parse_subtasks, prune_cycles};
pub use error::PlanError;
pub use executor::{DagExecutor, SubTaskRunner, summarize};
