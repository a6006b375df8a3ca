//! Cluster visualizer service

use super::{cmd, is_transient, probe_failed};
use crate::config::VisualizerConfig;
use crate::inventory::Host;
use crate::remote::{ExecOptions, RemoteExecutor};
use anyhow::Result;
use declarative::{Precondition, Step};
use std::sync::Arc;

/// Run the visualizer as a swarm service pinned to managers
#[derive(Debug)]
pub struct DeployVisualizerService {
    exec: Arc<RemoteExecutor>,
    config: VisualizerConfig,
}

impl DeployVisualizerService {
    pub fn new(exec: Arc<RemoteExecutor>, config: VisualizerConfig) -> Self {
        Self { exec, config }
    }

    /// `docker service create` invocation for the configured service
    pub fn create_command(&self) -> String {
        format!(
            "docker service create --detach --name={} --publish={} \
             --constraint=node.role==manager \
             --mount=type=bind,src=/var/run/docker.sock,dst=/var/run/docker.sock {}",
            self.config.name, self.config.publish, self.config.image
        )
    }
}

impl Step<Host> for DeployVisualizerService {
    fn name(&self) -> &'static str {
        "DeployVisualizerService"
    }

    fn description(&self) -> String {
        format!("Deploy the {} service", self.config.name)
    }

    fn precondition(&self, host: &Host) -> Result<Precondition> {
        let out = self
            .exec
            .execute(
                host,
                &cmd::service_exists(&self.config.name),
                &ExecOptions::new().hidden().warn(),
            )
            .map_err(|e| probe_failed(self.name(), host, e))?;

        if out.success() {
            Ok(Precondition::satisfied(format!(
                "service {} already exists",
                self.config.name
            )))
        } else {
            Ok(Precondition::Unmet)
        }
    }

    fn apply(&self, host: &Host) -> Result<String> {
        self.exec
            .execute(host, &self.create_command(), &ExecOptions::new().hidden())?;
        Ok(format!(
            "service {} published on {}",
            self.config.name, self.config.publish
        ))
    }

    fn is_retryable(&self, error: &anyhow::Error) -> bool {
        is_transient(error)
    }
}
