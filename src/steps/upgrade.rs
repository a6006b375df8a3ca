//! Operating system package upgrade

use super::{cmd, is_transient};
use crate::inventory::Host;
use crate::remote::{ExecOptions, RemoteExecutor};
use anyhow::Result;
use declarative::Step;
use std::sync::Arc;

/// Refresh the package index and upgrade installed packages
///
/// There is no cheap way to tell whether a host is fully upgraded, so the
/// precondition is always unmet. apt itself is a no-op when nothing changed.
#[derive(Debug)]
pub struct SystemUpgrade {
    exec: Arc<RemoteExecutor>,
}

impl SystemUpgrade {
    pub fn new(exec: Arc<RemoteExecutor>) -> Self {
        Self { exec }
    }
}

impl Step<Host> for SystemUpgrade {
    fn name(&self) -> &'static str {
        "SystemUpgrade"
    }

    fn description(&self) -> String {
        "Upgrade operating system packages".to_string()
    }

    fn apply(&self, host: &Host) -> Result<String> {
        self.exec
            .execute(host, cmd::SYSTEM_UPGRADE, &ExecOptions::new().sudo().hidden())?;
        Ok("packages upgraded".to_string())
    }

    fn is_retryable(&self, error: &anyhow::Error) -> bool {
        is_transient(error)
    }
}
