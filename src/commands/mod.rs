pub mod exec;
pub mod inventory;
pub mod plan;
pub mod status;
pub mod swarm;

use anyhow::Result;
use std::sync::Arc;

use crate::Context;
use crate::cli::PhaseFlags;
use crate::config::ClusterConfig;
use crate::engine::PlanOptions;
use crate::inventory::Inventory;
use crate::remote::{RemoteExecutor, SshTransport};

/// Loaded configuration plus an executor wired to SSH
pub struct Session {
    pub config: ClusterConfig,
    pub inventory: Inventory,
    pub executor: Arc<RemoteExecutor>,
}

/// Load the configuration and inventory without contacting any host
pub fn load(ctx: &Context) -> Result<(ClusterConfig, Inventory)> {
    let config = ClusterConfig::load(ctx.inventory.as_deref())?;
    let inventory = config.inventory()?;
    Ok((config, inventory))
}

/// Load everything and build the SSH-backed executor
pub fn connect(ctx: &Context) -> Result<Session> {
    let (config, inventory) = load(ctx)?;
    let transport = SshTransport::new(inventory.credentials().clone(), &config.ssh);
    let executor = RemoteExecutor::new(Arc::new(transport))
        .with_default_timeout(config.ssh.command_timeout())
        .with_jobs(config.execution.jobs);

    Ok(Session {
        config,
        inventory,
        executor: Arc::new(executor),
    })
}

pub fn plan_options(flags: &PhaseFlags) -> PlanOptions {
    PlanOptions {
        upgrade: flags.upgrade.enabled(),
        destroy: flags.destroy.enabled(),
    }
}
