//! Joining nodes to the swarm

use super::{TokenKind, cmd, is_transient, probe_failed, swarm_state};
use crate::error::BootstrapError;
use crate::inventory::Host;
use crate::remote::{ExecOptions, RemoteExecutor};
use crate::steps::JoinTokens;
use anyhow::Result;
use declarative::{Precondition, Step};
use std::sync::Arc;

/// Join hosts to the swarm run by the primary coordinator
///
/// Workers use the worker token; secondary coordinators use the manager
/// token. Hosts already in a swarm are left alone.
#[derive(Debug)]
pub struct JoinSwarm {
    exec: Arc<RemoteExecutor>,
    tokens: Arc<JoinTokens>,
    kind: TokenKind,
    coordinator: String,
}

impl JoinSwarm {
    pub fn workers(exec: Arc<RemoteExecutor>, tokens: Arc<JoinTokens>, coordinator: &Host) -> Self {
        Self {
            exec,
            tokens,
            kind: TokenKind::Worker,
            coordinator: coordinator.address.clone(),
        }
    }

    pub fn managers(exec: Arc<RemoteExecutor>, tokens: Arc<JoinTokens>, coordinator: &Host) -> Self {
        Self {
            kind: TokenKind::Manager,
            ..Self::workers(exec, tokens, coordinator)
        }
    }
}

impl Step<Host> for JoinSwarm {
    fn name(&self) -> &'static str {
        match self.kind {
            TokenKind::Worker => "JoinWorkers",
            TokenKind::Manager => "JoinManagers",
        }
    }

    fn description(&self) -> String {
        format!(
            "Join the swarm at {}:{} as {}",
            self.coordinator,
            super::SWARM_PORT,
            self.kind
        )
    }

    fn precondition(&self, host: &Host) -> Result<Precondition> {
        let state = swarm_state(&self.exec, host).map_err(|e| probe_failed(self.name(), host, e))?;
        if state.is_member() {
            Ok(Precondition::satisfied("already a swarm member"))
        } else {
            Ok(Precondition::Unmet)
        }
    }

    fn apply(&self, host: &Host) -> Result<String> {
        let token = self
            .tokens
            .get(self.kind)
            .ok_or_else(|| BootstrapError::TokenRetrieval {
                host: self.coordinator.clone(),
                reason: format!("no {} token was recorded", self.kind),
            })?;

        self.exec.execute(
            host,
            &cmd::swarm_join(token.expose(), &self.coordinator),
            &ExecOptions::new().sensitive(),
        )?;
        Ok(format!("joined as {} via {}", self.kind, self.coordinator))
    }

    fn is_retryable(&self, error: &anyhow::Error) -> bool {
        is_transient(error)
    }
}
