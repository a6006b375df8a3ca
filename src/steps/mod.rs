//! Cluster provisioning steps
//!
//! Every step drives one [`RemoteExecutor`] and implements
//! [`declarative::Step`] over [`Host`]: a cheap read-only probe decides
//! whether the host is already converged, and only then does the step act.

pub mod coordinator;
pub mod destroy;
pub mod join;
pub mod ports;
pub mod runtime;
pub mod token;
pub mod upgrade;
pub mod visualizer;

pub use coordinator::InitializeCoordinator;
pub use destroy::DestroyExistingCluster;
pub use join::JoinSwarm;
pub use ports::OpenCoordinatorPorts;
pub use runtime::InstallContainerRuntime;
pub use token::{JoinTokens, RetrieveJoinToken, TokenKind};
pub use upgrade::SystemUpgrade;
pub use visualizer::DeployVisualizerService;

use crate::error::{BootstrapError, ErrorKind, RemoteError};
use crate::inventory::Host;
use crate::remote::{ExecOptions, RemoteExecutor};

/// Port swarm nodes use to reach a manager
pub const SWARM_PORT: u16 = 2377;

/// Shell commands issued by the steps
pub mod cmd {
    pub const RUNTIME_PRESENT: &str = "command -v docker";
    pub const INSTALL_RUNTIME: &str = "curl -fsSL https://get.docker.com | sh -";
    // Under `sudo`, SUDO_USER is the login user
    pub const GRANT_RUNTIME_ACCESS: &str = "usermod -aG docker \"$SUDO_USER\"";
    pub const SWARM_STATE: &str = "docker info --format '{{.Swarm.LocalNodeState}}'";
    pub const SWARM_LEAVE: &str = "docker swarm leave -f";
    pub const SYSTEM_UPGRADE: &str = "export DEBIAN_FRONTEND=noninteractive && apt-get update && apt-get upgrade -y";
    pub const REJECT_RULE_PRESENT: &str = "grep -q -- '-A INPUT -j REJECT --reject-with icmp-host-prohibited' /etc/iptables/rules.v4";
    pub const DROP_REJECT_RULE: &str = "sed -i 's/-A INPUT -j REJECT --reject-with icmp-host-prohibited//' /etc/iptables/rules.v4 && netfilter-persistent flush && netfilter-persistent start";

    pub fn swarm_init(advertise: &str) -> String {
        format!("docker swarm init --advertise-addr {}", advertise)
    }

    pub fn swarm_join(token: &str, coordinator: &str) -> String {
        format!(
            "docker swarm join --token {} {}:{}",
            token,
            coordinator,
            super::SWARM_PORT
        )
    }

    pub fn join_token(kind: &str) -> String {
        format!("docker swarm join-token {} -q", kind)
    }

    pub fn service_exists(name: &str) -> String {
        format!("docker service inspect {}", name)
    }
}

/// Local swarm state of a node as reported by the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwarmState {
    /// Member of a swarm
    Active,
    /// Runtime present, not in a swarm
    Inactive,
    /// Joining, locked, or in error
    Other(String),
    /// Runtime missing or not answering
    Unavailable,
}

impl SwarmState {
    pub fn is_member(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Ask a node for its swarm state
///
/// A non-zero exit means the runtime could not answer, which is a state
/// rather than an error. Only failing to run the probe at all is an error.
pub fn swarm_state(exec: &RemoteExecutor, host: &Host) -> Result<SwarmState, RemoteError> {
    let out = exec.execute(host, cmd::SWARM_STATE, &ExecOptions::new().hidden().warn())?;
    if !out.success() {
        return Ok(SwarmState::Unavailable);
    }
    Ok(match out.stdout_trimmed() {
        "active" => SwarmState::Active,
        "inactive" => SwarmState::Inactive,
        other => SwarmState::Other(other.to_string()),
    })
}

/// Wrap a probe transport failure so it reads as a precondition failure
pub fn probe_failed(step: &'static str, host: &Host, source: RemoteError) -> anyhow::Error {
    BootstrapError::PreconditionCheck {
        step,
        host: host.address.clone(),
        source,
    }
    .into()
}

/// Which remote failures a step absorbs as success
#[derive(Debug, Clone, Default)]
pub struct Tolerance {
    kinds: Vec<ErrorKind>,
    stderr_markers: Vec<&'static str>,
}

impl Tolerance {
    /// Absorb any non-zero exit
    pub fn any_exit() -> Self {
        Self {
            kinds: vec![ErrorKind::NonZeroExit],
            stderr_markers: Vec::new(),
        }
    }

    /// Absorb a non-zero exit whose stderr contains `marker`
    pub fn exit_with(marker: &'static str) -> Self {
        Self {
            kinds: Vec::new(),
            stderr_markers: vec![marker],
        }
    }

    pub fn matches(&self, error: &anyhow::Error) -> bool {
        let Some(remote) = error.downcast_ref::<RemoteError>() else {
            return false;
        };
        if self.kinds.contains(&remote.kind()) {
            return true;
        }
        remote
            .stderr()
            .is_some_and(|stderr| self.stderr_markers.iter().any(|m| stderr.contains(m)))
    }
}

/// Transient transport failures are worth another attempt
pub fn is_transient(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<RemoteError>()
        .is_some_and(|e| e.kind().is_retryable())
}
