//! Bootstrap state machine
//!
//! Walks the phases of an [`ExecutionPlan`] strictly in order. A phase is
//! entered only after the previous one finished with no failed host; the
//! first failure moves the run to [`Phase::Failed`] and nothing after it
//! runs. Join phases additionally require a recorded join token.

use super::planner::{ExecutionPlan, Phase};
use super::report::{PhaseReport, RunReport};
use crate::error::BootstrapError;
use chrono::Utc;
use declarative::{Outcome, ProgressCallback, StepResult, run_steps};

pub struct Orchestrator<'a> {
    plan: &'a ExecutionPlan,
    progress: &'a dyn ProgressCallback,
}

impl<'a> Orchestrator<'a> {
    pub fn new(plan: &'a ExecutionPlan, progress: &'a dyn ProgressCallback) -> Self {
        Self { plan, progress }
    }

    /// Drive the plan to `Done` or `Failed`
    pub fn run(&self) -> RunReport {
        let mut report = RunReport::new();
        let mut state = Phase::Idle;

        while !state.is_terminal() {
            let next = state.successor();
            if next.is_terminal() {
                state = next;
                break;
            }
            // Optional phases that were not requested
            let Some(phase_plan) = self.plan.phase(next) else {
                state = next;
                continue;
            };

            if next.requires_token() && self.plan.tokens().worker().is_none() {
                self.fail(&mut report, next, self.missing_token("no join token recorded"));
                state = Phase::Failed;
                break;
            }

            log::info!("Entering {}", next);
            let results = match run_steps(&phase_plan.steps, self.plan.run_options(), self.progress)
            {
                Ok(results) => results,
                Err(e) => undispatched(phase_plan, &format!("{:#}", e)),
            };
            let phase_report = PhaseReport {
                phase: next,
                results,
            };

            let failure = if phase_report.is_failed() {
                Some(self.phase_error(&phase_report))
            } else if next == Phase::Token && self.plan.tokens().worker().is_none() {
                Some(self.missing_token("coordinator returned no join token"))
            } else {
                None
            };

            let summary = phase_report.summary();
            report.phases.push(phase_report);

            if let Some(error) = failure {
                self.fail(&mut report, next, error);
                state = Phase::Failed;
                break;
            }

            log::info!(
                "{} complete: {} changed, {} unchanged",
                next,
                summary.succeeded,
                summary.skipped
            );
            state = next;
        }

        report.final_state = state;
        report.finished_at = Some(Utc::now());
        report
    }

    fn fail(&self, report: &mut RunReport, phase: Phase, error: BootstrapError) {
        log::error!("{} failed: {}", phase, error);
        report.failed_phase = Some(phase);
        report.error = Some(error);
    }

    fn phase_error(&self, phase: &PhaseReport) -> BootstrapError {
        if phase.phase == Phase::Token {
            let failed = phase.results.iter().find(|r| r.is_failure());
            return BootstrapError::TokenRetrieval {
                host: failed.map(|r| r.target.clone()).unwrap_or_default(),
                reason: failed.map(|r| r.detail.clone()).unwrap_or_default(),
            };
        }
        BootstrapError::PhaseFailed {
            phase: phase.phase.name().to_string(),
            hosts: phase.failed_hosts(),
        }
    }

    fn missing_token(&self, reason: &str) -> BootstrapError {
        let host = self
            .plan
            .phase(Phase::Token)
            .and_then(|p| p.steps.first())
            .and_then(|s| s.target_ids().into_iter().next())
            .unwrap_or_default();
        BootstrapError::TokenRetrieval {
            host,
            reason: reason.to_string(),
        }
    }
}

/// Failed results for every target when the phase could not be dispatched
fn undispatched(phase: &super::planner::PhasePlan, reason: &str) -> Vec<StepResult> {
    phase
        .steps
        .iter()
        .flat_map(|step| {
            step.target_ids().into_iter().map(move |target| {
                StepResult::new(
                    target,
                    step.name(),
                    Outcome::Failed,
                    format!("could not dispatch: {}", reason),
                )
            })
        })
        .collect()
}
