//! Swarm initialization on the primary coordinator

use super::{cmd, is_transient, probe_failed, swarm_state};
use crate::inventory::Host;
use crate::remote::{ExecOptions, RemoteExecutor};
use anyhow::Result;
use declarative::{Precondition, Step};
use std::sync::Arc;

#[derive(Debug)]
pub struct InitializeCoordinator {
    exec: Arc<RemoteExecutor>,
}

impl InitializeCoordinator {
    pub fn new(exec: Arc<RemoteExecutor>) -> Self {
        Self { exec }
    }
}

impl Step<Host> for InitializeCoordinator {
    fn name(&self) -> &'static str {
        "InitializeCoordinator"
    }

    fn description(&self) -> String {
        "Initialize the swarm".to_string()
    }

    fn precondition(&self, host: &Host) -> Result<Precondition> {
        let state = swarm_state(&self.exec, host).map_err(|e| probe_failed(self.name(), host, e))?;
        if state.is_member() {
            Ok(Precondition::satisfied("swarm already initialized"))
        } else {
            Ok(Precondition::Unmet)
        }
    }

    fn apply(&self, host: &Host) -> Result<String> {
        self.exec
            .execute(host, &cmd::swarm_init(&host.address), &ExecOptions::new())?;
        Ok(format!("swarm initialized, advertising {}", host.address))
    }

    fn is_retryable(&self, error: &anyhow::Error) -> bool {
        is_transient(error)
    }
}
