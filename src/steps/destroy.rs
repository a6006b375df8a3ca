//! Leave any existing swarm

use super::{SwarmState, Tolerance, cmd, is_transient, probe_failed, swarm_state};
use crate::inventory::Host;
use crate::remote::{ExecOptions, RemoteExecutor};
use anyhow::Result;
use declarative::{Precondition, Step};
use std::sync::Arc;

/// Force every host out of whatever swarm it belongs to
#[derive(Debug)]
pub struct DestroyExistingCluster {
    exec: Arc<RemoteExecutor>,
    tolerance: Tolerance,
}

impl DestroyExistingCluster {
    pub fn new(exec: Arc<RemoteExecutor>) -> Self {
        Self {
            exec,
            tolerance: Tolerance::exit_with("not part of a swarm"),
        }
    }
}

impl Step<Host> for DestroyExistingCluster {
    fn name(&self) -> &'static str {
        "DestroyExistingCluster"
    }

    fn description(&self) -> String {
        "Leave any existing swarm".to_string()
    }

    fn precondition(&self, host: &Host) -> Result<Precondition> {
        match swarm_state(&self.exec, host) {
            // error, locked and pending nodes are still tied to a swarm
            Ok(SwarmState::Active | SwarmState::Other(_)) => Ok(Precondition::Unmet),
            Ok(SwarmState::Inactive) => Ok(Precondition::satisfied("not part of a swarm")),
            Ok(SwarmState::Unavailable) => {
                log::warn!(
                    "[{}] container runtime did not answer; not leaving any swarm",
                    host.address
                );
                Ok(Precondition::satisfied("container runtime not available"))
            }
            Err(e) => Err(probe_failed(self.name(), host, e)),
        }
    }

    fn apply(&self, host: &Host) -> Result<String> {
        self.exec.execute(host, cmd::SWARM_LEAVE, &ExecOptions::new())?;
        Ok("left swarm".to_string())
    }

    fn tolerates(&self, error: &anyhow::Error) -> bool {
        self.tolerance.matches(error)
    }

    fn is_retryable(&self, error: &anyhow::Error) -> bool {
        is_transient(error)
    }
}
