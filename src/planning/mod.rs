//! Delegation planning
//!
//! Turns a resolved selection into ordered, fully specified delegation steps.

pub mod planner;
pub mod segment;
pub mod step;

pub use planner::{DelegationPlanner, PlanOutcome};
pub use segment::{split_clauses, Clause};
pub use step::DelegationStepBuilder;
