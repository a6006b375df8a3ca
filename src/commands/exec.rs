//! `swarmup exec` - ad-hoc command on a host group

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::ExecutionMode;
use std::time::Duration;

use super::connect;
use crate::Context;
use crate::cli::{ExecArgs, RoleFilter};
use crate::inventory::{Host, Inventory, Role};
use crate::remote::{ExecOptions, shell_quote};
use crate::ui;

pub fn run(ctx: &Context, args: ExecArgs) -> Result<()> {
    let session = connect(ctx)?;
    let hosts = select_hosts(&session.inventory, args.role);
    if hosts.is_empty() {
        ui::warn("No hosts match that role");
        return Ok(());
    }

    let command = remote_command(&args.command);
    let mode = if args.parallel {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Serial
    };
    let mut opts = ExecOptions::new().hidden();
    if args.sudo {
        opts = opts.sudo();
    }
    if let Some(secs) = args.timeout {
        opts = opts.timeout(Duration::from_secs(secs));
    }

    let results =
        session
            .executor
            .execute_group(&hosts, &command, &opts, mode, args.continue_on_error);

    for (host, result) in results.iter() {
        match result {
            Ok(output) => {
                println!("{} {}", "✓".green(), host.address.bold());
                if !ctx.quiet && !output.stdout.trim().is_empty() {
                    println!("{}", ui::indent(output.stdout.trim_end()));
                }
                if ctx.verbose > 0 && !output.stderr.trim().is_empty() {
                    ui::dim(output.stderr.trim_end());
                }
            }
            Err(e) => {
                println!("{} {}", "✗".red(), host.address.bold());
                ui::dim(&format!("{}: {}", e.kind().description(), e));
            }
        }
    }

    let skipped = hosts.len() - results.reached();
    if skipped > 0 {
        ui::dim(&format!("{} host(s) not reached", skipped));
    }

    if !results.all_succeeded() {
        bail!("command failed on {}", results.failed_hosts().join(", "));
    }
    Ok(())
}

/// Build the remote command line, keeping each argument's boundaries
fn remote_command(argv: &[String]) -> String {
    match argv {
        [single] => single.clone(),
        _ => argv
            .iter()
            .map(|arg| shell_quote(arg))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn select_hosts(inventory: &Inventory, filter: RoleFilter) -> Vec<Host> {
    match filter {
        RoleFilter::Coordinator => inventory.with_role(Role::Coordinator),
        RoleFilter::Worker => inventory.with_role(Role::Worker),
        RoleFilter::All => inventory.hosts().to_vec(),
    }
}
