//! Bootstrap engine
//!
//! The engine orchestrates:
//! 1. Planning - Lay out phases and the hosts each step runs on
//! 2. Running - Walk the phases in order, gating joins on the join token
//! 3. Reporting - Per-host outcomes, as a table or JSON

pub mod orchestrator;
pub mod planner;
pub mod report;

pub use orchestrator::Orchestrator;
pub use planner::{ExecutionPlan, Phase, PlanOptions};
