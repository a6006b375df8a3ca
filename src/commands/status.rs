//! `swarmup status` - read-only convergence check

use anyhow::Result;
use colored::Colorize;
use declarative::{ProbeSummary, probe_step};

use super::connect;
use crate::Context;
use crate::engine::report::display_probe;
use crate::engine::{ExecutionPlan, Phase, PlanOptions};

pub fn run(ctx: &Context) -> Result<()> {
    let session = connect(ctx)?;
    let plan = ExecutionPlan::build(
        &session.inventory,
        &session.config,
        PlanOptions::default(),
        session.executor.clone(),
    );
    let jobs = session.config.execution.jobs;

    let mut grouped = Vec::new();
    for phase in plan.phases() {
        // Tokens are fetched fresh every run; there is nothing to probe
        if phase.phase == Phase::Token {
            continue;
        }
        let mut entries = Vec::new();
        for step in &phase.steps {
            entries.extend(probe_step(step, jobs)?);
        }
        grouped.push((phase.phase, entries));
    }

    display_probe(&grouped);

    let all: Vec<_> = grouped.into_iter().flat_map(|(_, e)| e).collect();
    let summary = ProbeSummary::from_entries(&all);
    if !ctx.quiet {
        println!();
        if summary.is_converged() {
            println!("  {} Cluster is converged", "✓".green());
        } else {
            println!(
                "  {} {} action(s) would run on `swarmup swarm`",
                "→".cyan(),
                summary.pending
            );
        }
    }
    Ok(())
}
