//! `swarmup plan` - show what a run would do

use anyhow::Result;

use super::{connect, plan_options};
use crate::Context;
use crate::cli::PhaseFlags;
use crate::engine::ExecutionPlan;
use crate::engine::report::display_plan;

pub fn run(ctx: &Context, flags: PhaseFlags) -> Result<()> {
    // SSH sessions open lazily, so building the plan contacts no host
    let session = connect(ctx)?;
    let plan = ExecutionPlan::build(
        &session.inventory,
        &session.config,
        plan_options(&flags),
        session.executor,
    );
    display_plan(&plan);
    Ok(())
}
