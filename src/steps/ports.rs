//! Open the coordinator firewall for swarm traffic

use super::{Tolerance, cmd, probe_failed};
use crate::inventory::Host;
use crate::remote::{ExecOptions, RemoteExecutor};
use anyhow::Result;
use declarative::{Precondition, Step};
use std::sync::Arc;

/// Drop the blanket REJECT rule some cloud images ship in rules.v4
///
/// Hosts without the rule (or without iptables-persistent at all) are
/// already open. Failure to reload the firewall is tolerated.
#[derive(Debug)]
pub struct OpenCoordinatorPorts {
    exec: Arc<RemoteExecutor>,
    tolerance: Tolerance,
}

impl OpenCoordinatorPorts {
    pub fn new(exec: Arc<RemoteExecutor>) -> Self {
        Self {
            exec,
            tolerance: Tolerance::any_exit(),
        }
    }
}

impl Step<Host> for OpenCoordinatorPorts {
    fn name(&self) -> &'static str {
        "OpenCoordinatorPorts"
    }

    fn description(&self) -> String {
        "Remove the blanket REJECT rule from the coordinator firewall".to_string()
    }

    fn precondition(&self, host: &Host) -> Result<Precondition> {
        let out = self
            .exec
            .execute(
                host,
                cmd::REJECT_RULE_PRESENT,
                &ExecOptions::new().sudo().hidden().warn(),
            )
            .map_err(|e| probe_failed(self.name(), host, e))?;

        if out.success() {
            Ok(Precondition::Unmet)
        } else {
            Ok(Precondition::satisfied("no blanket REJECT rule"))
        }
    }

    fn apply(&self, host: &Host) -> Result<String> {
        self.exec
            .execute(host, cmd::DROP_REJECT_RULE, &ExecOptions::new().sudo().hidden())?;
        Ok("removed REJECT rule".to_string())
    }

    fn tolerates(&self, error: &anyhow::Error) -> bool {
        self.tolerance.matches(error)
    }
}
