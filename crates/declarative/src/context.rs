//! Progress reporting hooks
//!
//! The engine reports through this trait so that it does not depend on
//! any particular terminal UI.

use crate::types::{ExecutionMode, StepResult};

/// Progress callback for step execution
///
/// Methods take `&self` because parallel groups report from worker
/// threads; implementations must synchronize internally.
pub trait ProgressCallback: Send + Sync {
    /// Called before a step fans out over its targets
    fn on_step_start(&self, step: &str, targets: usize, mode: ExecutionMode);

    /// Called as each target finishes
    fn on_target_complete(&self, result: &StepResult);

    /// Called after every target of the step has finished
    fn on_step_complete(&self, step: &str);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_step_start(&self, _step: &str, _targets: usize, _mode: ExecutionMode) {}
    fn on_target_complete(&self, _result: &StepResult) {}
    fn on_step_complete(&self, _step: &str) {}
}
