//! `swarmup swarm` - bring the cluster up

use anyhow::{Context as AnyhowContext, Result};
use dialoguer::Confirm;

use super::{Session, connect, plan_options};
use crate::Context;
use crate::cli::SwarmArgs;
use crate::engine::report::display_report;
use crate::engine::{ExecutionPlan, Orchestrator};
use crate::progress::StepProgress;
use crate::ui;

pub fn run(ctx: &Context, args: SwarmArgs) -> Result<()> {
    let session = connect(ctx)?;
    let options = plan_options(&args.flags);

    if options.destroy && !args.yes && !confirm_destroy(&session)? {
        ui::warn("Aborted; no host was touched");
        return Ok(());
    }

    let plan = ExecutionPlan::build(
        &session.inventory,
        &session.config,
        options,
        session.executor.clone(),
    );
    log::info!(
        "Bootstrapping {} host(s) across {} phases",
        session.inventory.hosts().len(),
        plan.phases().len()
    );

    let progress = StepProgress::new(ctx.quiet || args.json);
    let mut report = Orchestrator::new(&plan, &progress).run();

    if args.json {
        println!("{}", report.to_json()?);
    } else if !ctx.quiet || !report.is_success() {
        display_report(&report);
    }

    match (report.failed_phase, report.error.take()) {
        (Some(phase), Some(error)) => {
            Err(anyhow::Error::new(error).context(format!("bootstrap aborted in {}", phase)))
        }
        _ => {
            if !ctx.quiet && !args.json {
                ui::success("Swarm is up");
            }
            Ok(())
        }
    }
}

/// Ask before tearing down a cluster; only prompts on a terminal
fn confirm_destroy(session: &Session) -> Result<bool> {
    if !console::Term::stdout().is_term() {
        return Ok(true);
    }

    ui::warn(&format!(
        "--destroy yes will force {} host(s) out of their current swarm",
        session.inventory.hosts().len()
    ));
    Confirm::new()
        .with_prompt("Destroy the existing cluster?")
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}
