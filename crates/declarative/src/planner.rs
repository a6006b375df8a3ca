//! Planned steps - a step bound to the targets it runs on

use crate::step::{BoxedStep, Target};
use crate::types::ExecutionMode;

/// A step tagged with its target subset and fan-out mode
pub struct PlannedStep<T: Target> {
    pub step: BoxedStep<T>,
    /// Targets in the order they should be visited
    pub targets: Vec<T>,
    pub mode: ExecutionMode,
}

impl<T: Target> PlannedStep<T> {
    pub fn new(step: BoxedStep<T>, targets: Vec<T>, mode: ExecutionMode) -> Self {
        Self {
            step,
            targets,
            mode,
        }
    }

    /// Step name, for display
    pub fn name(&self) -> &'static str {
        self.step.name()
    }

    /// Target identities in visit order
    pub fn target_ids(&self) -> Vec<String> {
        self.targets.iter().map(Target::id).collect()
    }

    /// Check if the step has nothing to run on
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<T: Target> std::fmt::Debug for PlannedStep<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannedStep")
            .field("step", &self.step)
            .field("targets", &self.target_ids())
            .field("mode", &self.mode)
            .finish()
    }
}
