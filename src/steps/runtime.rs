//! Container runtime installation

use super::{cmd, is_transient, probe_failed};
use crate::inventory::Host;
use crate::remote::{ExecOptions, RemoteExecutor};
use anyhow::Result;
use declarative::{Precondition, Step};
use std::sync::Arc;

/// Install docker and let the login user talk to it without sudo
#[derive(Debug)]
pub struct InstallContainerRuntime {
    exec: Arc<RemoteExecutor>,
}

impl InstallContainerRuntime {
    pub fn new(exec: Arc<RemoteExecutor>) -> Self {
        Self { exec }
    }
}

impl Step<Host> for InstallContainerRuntime {
    fn name(&self) -> &'static str {
        "InstallContainerRuntime"
    }

    fn description(&self) -> String {
        "Install the docker container runtime".to_string()
    }

    fn precondition(&self, host: &Host) -> Result<Precondition> {
        let out = self
            .exec
            .execute(host, cmd::RUNTIME_PRESENT, &ExecOptions::new().hidden().warn())
            .map_err(|e| probe_failed(self.name(), host, e))?;

        if out.success() {
            Ok(Precondition::satisfied(format!(
                "docker already installed at {}",
                out.stdout_trimmed()
            )))
        } else {
            Ok(Precondition::Unmet)
        }
    }

    fn apply(&self, host: &Host) -> Result<String> {
        let opts = ExecOptions::new().sudo().hidden();
        self.exec.execute(host, cmd::INSTALL_RUNTIME, &opts)?;
        self.exec.execute(host, cmd::GRANT_RUNTIME_ACCESS, &opts)?;
        Ok("docker installed".to_string())
    }

    fn is_retryable(&self, error: &anyhow::Error) -> bool {
        is_transient(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::Transport;
    use crate::testing::FakeCluster;
    use declarative::{ExecutionMode, NoProgress, Outcome, RunOptions, run_step};

    fn setup(cluster: FakeCluster) -> (Arc<FakeCluster>, InstallContainerRuntime) {
        let cluster = Arc::new(cluster);
        let exec = Arc::new(RemoteExecutor::new(cluster.clone() as Arc<dyn Transport>));
        (cluster, InstallContainerRuntime::new(exec))
    }

    #[test]
    fn test_installed_runtime_is_skipped() {
        let (cluster, step) = setup(FakeCluster::new().with_docker(&["node2"]));

        let results = run_step(
            &step,
            &[Host::worker("node2")],
            ExecutionMode::Serial,
            &RunOptions::default(),
            &NoProgress,
        )
        .unwrap();

        assert_eq!(results[0].outcome, Outcome::Skipped);
        assert_eq!(cluster.commands_for("node2"), vec![cmd::RUNTIME_PRESENT]);
    }

    #[test]
    fn test_installs_missing_runtime() {
        let (cluster, step) = setup(FakeCluster::new());

        let results = run_step(
            &step,
            &[Host::worker("node2"), Host::worker("node3")],
            ExecutionMode::Parallel,
            &RunOptions::default(),
            &NoProgress,
        )
        .unwrap();

        assert!(results.iter().all(|r| r.outcome == Outcome::Success));
        assert!(cluster.has_docker("node2"));
        assert!(cluster.has_docker("node3"));

        let commands = cluster.commands_for("node2");
        assert_eq!(commands.len(), 3);
        assert!(commands[1].contains("get.docker.com"));
        assert!(commands[2].contains("usermod -aG docker"));
    }

    #[test]
    fn test_install_failure_stops_before_group_change() {
        let (cluster, step) = setup(FakeCluster::new());
        cluster.fail_command("node2", "get.docker.com", 1, "curl: (6) Could not resolve host");

        assert!(step.apply(&Host::worker("node2")).is_err());
        assert!(
            !cluster
                .commands_for("node2")
                .iter()
                .any(|c| c.contains("usermod"))
        );
    }
}
