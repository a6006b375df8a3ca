//! `swarmup inventory` - show hosts and roles

use anyhow::Result;
use colored::Colorize;

use super::load;
use crate::Context;
use crate::config::default_inventory_path;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let (config, inventory) = load(ctx)?;

    ui::header("Inventory");
    let source = match &ctx.inventory {
        Some(path) => path.display().to_string(),
        None => {
            let path = default_inventory_path()?;
            if path.exists() {
                path.display().to_string()
            } else {
                "built-in defaults".to_string()
            }
        }
    };
    ui::kv("Source", &source);
    ui::kv("SSH port", &config.ssh.port.to_string());
    ui::kv("Worker join", &config.execution.worker_join.to_string());

    ui::section("Hosts");
    for (i, host) in inventory.hosts().iter().enumerate() {
        let note = if i == 0 {
            " (initializes the swarm)".dimmed().to_string()
        } else {
            String::new()
        };
        println!("  {:<12} {}{}", host.role.to_string().cyan(), host.address, note);
    }
    Ok(())
}
