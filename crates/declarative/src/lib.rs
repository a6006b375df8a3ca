//! # Declarative
//!
//! A small engine for idempotent, precondition-guarded provisioning steps.
//!
//! ## Core Concepts
//!
//! - **Target**: something a step runs against (a host, a directory)
//! - **Step**: a precondition probe plus a side-effecting action
//! - **PlannedStep**: a step bound to its targets and an [`ExecutionMode`]
//! - **Executor**: fans a step out over its targets, serially or in parallel
//!
//! A step whose precondition already holds reports
//! [`Outcome::Skipped`] and performs no action, which makes re-running a
//! whole pipeline safe.
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     ExecutionMode, NoProgress, PlannedStep, Precondition, RunOptions, Step, Target, run_steps,
//! };
//!
//! let plan = vec![PlannedStep::new(
//!     Box::new(InstallPackage::new("curl")),
//!     hosts,
//!     ExecutionMode::Parallel,
//! )];
//! let results = run_steps(&plan, &RunOptions::default(), &NoProgress)?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`ProgressCallback`]: receives per-target progress, from worker threads
//!   in parallel mode

pub mod context;
pub mod executor;
pub mod planner;
pub mod probe;
pub mod step;
pub mod types;

// Re-export main types at crate root
pub use context::{NoProgress, ProgressCallback};
pub use executor::{fan_out, run_step, run_steps};
pub use planner::PlannedStep;
pub use probe::{ProbeEntry, ProbeState, ProbeSummary, probe_step};
pub use step::{BoxedStep, Step, Target};
pub use types::{
    ExecutionMode, Outcome, OutcomeSummary, Precondition, RetryConfig, RunOptions, StepResult,
};
