//! Response planning and execution.
//!
//! The planner maps an alert to an ordered sequence of containment actions
//! and applies the auto-approval gate; the executor owns the per-plan state
//! machine and drives actions through the pluggable cloud effector.

pub mod effector;
pub mod executor;
pub mod model;
pub mod planner;
