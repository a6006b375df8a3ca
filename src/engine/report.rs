//! Run report and its terminal rendering

use super::planner::{ExecutionPlan, Phase};
use crate::error::BootstrapError;
use chrono::{DateTime, Utc};
use colored::Colorize;
use declarative::{Outcome, OutcomeSummary, ProbeEntry, ProbeState, StepResult};
use serde::Serialize;

/// Results of one phase that ran
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub results: Vec<StepResult>,
}

impl PhaseReport {
    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary::from_results(&self.results)
    }

    pub fn is_failed(&self) -> bool {
        self.results.iter().any(StepResult::is_failure)
    }

    /// Distinct failed hosts, in result order
    pub fn failed_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        for result in self.results.iter().filter(|r| r.is_failure()) {
            if !hosts.contains(&result.target) {
                hosts.push(result.target.clone());
            }
        }
        hosts
    }
}

/// Everything a bootstrap run did
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub final_state: Phase,
    pub phases: Vec<PhaseReport>,
    /// Phase that aborted the run
    pub failed_phase: Option<Phase>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<BootstrapError>,
}

fn serialize_error<S>(error: &Option<BootstrapError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            final_state: Phase::Idle,
            phases: Vec::new(),
            failed_phase: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.final_state == Phase::Done
    }

    /// Every step result across phases
    pub fn results(&self) -> impl Iterator<Item = &StepResult> {
        self.phases.iter().flat_map(|p| p.results.iter())
    }

    pub fn summary(&self) -> OutcomeSummary {
        let mut total = OutcomeSummary::default();
        for result in self.results() {
            total.add(result.outcome);
        }
        total
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
impl RunReport {
    /// Phases entered, in order
    pub fn executed_phases(&self) -> Vec<Phase> {
        self.phases.iter().map(|p| p.phase).collect()
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

fn outcome_symbol(outcome: Outcome) -> colored::ColoredString {
    match outcome {
        Outcome::Success => "✓".green(),
        Outcome::Skipped => "○".dimmed(),
        Outcome::Failed => "✗".red(),
    }
}

/// Print the per-phase result table
pub fn display_report(report: &RunReport) {
    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Bootstrap Report".bold()
    );
    println!("│");

    for phase in &report.phases {
        let marker = if phase.is_failed() {
            "✗".red()
        } else {
            "✓".green()
        };
        println!("│ {} {}", marker, phase.phase.name().bold());
        for result in &phase.results {
            println!(
                "│   {} {:<24} {:<20} {}",
                outcome_symbol(result.outcome),
                result.step,
                result.target,
                result.detail.dimmed()
            );
        }
        println!("│");
    }

    let summary = report.summary();
    let elapsed = report
        .finished_at
        .map(|end| (end - report.started_at).num_seconds())
        .unwrap_or_default();

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ {} changed, {} unchanged, {} failed in {}s",
        summary.succeeded.to_string().green(),
        summary.skipped.to_string().dimmed(),
        summary.failed.to_string().red(),
        elapsed
    );
    let state = if report.is_success() {
        report.final_state.name().green().bold()
    } else {
        report.final_state.name().red().bold()
    };
    println!("│ Final state: {}", state);
    println!("└─────────────────────────────────────────────────────┘");
}

/// Print the phases and actions a run would take
pub fn display_plan(plan: &ExecutionPlan) {
    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Bootstrap Plan".bold()
    );
    println!("│");

    for phase in plan.phases() {
        println!("│ {}", phase.phase.name().bold());
        for step in &phase.steps {
            let targets = if step.is_empty() {
                "(no hosts)".dimmed().to_string()
            } else {
                step.target_ids().join(", ")
            };
            println!(
                "│   {} {:<24} [{}] {}",
                "→".cyan(),
                step.name(),
                step.mode,
                targets
            );
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ {} phases, {} host actions",
        plan.phases().len().to_string().bold(),
        plan.action_count().to_string().bold()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Print probe results grouped by phase
pub fn display_probe(entries: &[(Phase, Vec<ProbeEntry>)]) {
    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Cluster Status".bold()
    );
    println!("│");

    let mut pending = 0;
    let mut errors = 0;
    for (phase, probes) in entries {
        println!("│ {}", phase.name().bold());
        for probe in probes {
            let (symbol, detail) = match &probe.state {
                ProbeState::Converged { reason } => ("✓".green(), reason.clone()),
                ProbeState::Pending => {
                    pending += 1;
                    ("~".yellow(), "needs action".to_string())
                }
                ProbeState::Error { message } => {
                    errors += 1;
                    ("✗".red(), message.clone())
                }
            };
            println!(
                "│   {} {:<24} {:<20} {}",
                symbol,
                probe.step,
                probe.target,
                detail.dimmed()
            );
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ {} pending, {} unreachable or unknown",
        pending.to_string().yellow(),
        errors.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(target: &str, outcome: Outcome) -> StepResult {
        StepResult::new(target, "JoinWorkers", outcome, "detail")
    }

    #[test]
    fn test_failed_hosts_are_distinct() {
        let phase = PhaseReport {
            phase: Phase::WorkerJoin,
            results: vec![
                result("node2", Outcome::Failed),
                result("node3", Outcome::Success),
                result("node2", Outcome::Failed),
            ],
        };
        assert!(phase.is_failed());
        assert_eq!(phase.failed_hosts(), vec!["node2"]);
    }

    #[test]
    fn test_json_report() {
        let mut report = RunReport::new();
        report.phases.push(PhaseReport {
            phase: Phase::Runtime,
            results: vec![result("node1", Outcome::Skipped)],
        });
        report.final_state = Phase::Failed;
        report.failed_phase = Some(Phase::Runtime);
        report.error = Some(BootstrapError::PhaseFailed {
            phase: "RuntimePhase".to_string(),
            hosts: vec!["node1".to_string()],
        });

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["final_state"], "Failed");
        assert_eq!(value["phases"][0]["results"][0]["outcome"], "skipped");
        assert_eq!(value["error"], "phase RuntimePhase failed on node1");
        assert!(value["started_at"].is_string());
    }
}
