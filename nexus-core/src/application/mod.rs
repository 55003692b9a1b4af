pub mod agent;
pub mod approval;
pub mod memory;
pub mod performance;
pub mod planner;
pub mod routing;
pub mod rules;
pub mod validation;
