//! Read-only precondition probing
//!
//! Evaluates each step's precondition without running any action, to show
//! which targets are already converged and which still need work.

use crate::executor::fan_out;
use crate::planner::PlannedStep;
use crate::step::Target;
use crate::types::{ExecutionMode, Precondition};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// What a probe found for one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeState {
    /// Precondition holds; the step would be skipped
    Converged { reason: String },
    /// The step's action would run
    Pending,
    /// The probe itself could not run
    Error { message: String },
}

/// Probe result for one step on one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeEntry {
    pub step: String,
    pub target: String,
    pub state: ProbeState,
}

/// Counts across a set of probe entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSummary {
    pub converged: usize,
    pub pending: usize,
    pub errors: usize,
}

impl ProbeSummary {
    pub fn from_entries(entries: &[ProbeEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry.state {
                ProbeState::Converged { .. } => summary.converged += 1,
                ProbeState::Pending => summary.pending += 1,
                ProbeState::Error { .. } => summary.errors += 1,
            }
        }
        summary
    }

    /// Check if nothing is left to do
    pub fn is_converged(&self) -> bool {
        self.pending == 0 && self.errors == 0
    }
}

/// Probe every target of a planned step concurrently
pub fn probe_step<T: Target>(planned: &PlannedStep<T>, jobs: usize) -> Result<Vec<ProbeEntry>> {
    let step = planned.step.as_ref();

    fan_out(
        &planned.targets,
        ExecutionMode::Parallel,
        jobs,
        true,
        |_: &ProbeEntry| false,
        |target| {
            let state = match step.precondition(target) {
                Ok(Precondition::Satisfied { reason }) => ProbeState::Converged { reason },
                Ok(Precondition::Unmet) => ProbeState::Pending,
                Err(e) => ProbeState::Error {
                    message: format!("{:#}", e),
                },
            };
            ProbeEntry {
                step: step.name().to_string(),
                target: target.id(),
                state,
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Step;

    struct Node(&'static str);

    impl Target for Node {
        fn id(&self) -> String {
            self.0.to_string()
        }
    }

    #[derive(Debug)]
    struct HalfDone;

    impl Step<Node> for HalfDone {
        fn name(&self) -> &'static str {
            "HalfDone"
        }

        fn description(&self) -> String {
            "converged on a, pending on b, broken on c".into()
        }

        fn precondition(&self, target: &Node) -> Result<Precondition> {
            match target.0 {
                "a" => Ok(Precondition::satisfied("present")),
                "b" => Ok(Precondition::Unmet),
                _ => anyhow::bail!("unreachable"),
            }
        }

        fn apply(&self, _target: &Node) -> Result<String> {
            panic!("probing must never apply");
        }
    }

    #[test]
    fn test_probe_step_classifies_targets() {
        let planned = PlannedStep::new(
            Box::new(HalfDone),
            vec![Node("a"), Node("b"), Node("c")],
            ExecutionMode::Serial,
        );
        let entries = probe_step(&planned, 4).unwrap();

        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[0].state, ProbeState::Converged { .. }));
        assert_eq!(entries[1].state, ProbeState::Pending);
        assert!(matches!(entries[2].state, ProbeState::Error { .. }));

        let summary = ProbeSummary::from_entries(&entries);
        assert_eq!(summary.converged, 1);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.errors, 1);
        assert!(!summary.is_converged());
    }
}
