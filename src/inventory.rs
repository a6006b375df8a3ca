//! Inventory model: hosts, roles and the shared SSH credential
//!
//! The inventory is built once from configuration and never mutated.

use crate::error::BootstrapError;
use declarative::Target;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

/// Role a host plays in the swarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Initializes the cluster and issues join tokens
    Coordinator,
    /// Joins an existing cluster with a token
    Worker,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinator => f.write_str("coordinator"),
            Self::Worker => f.write_str("worker"),
        }
    }
}

/// A remote host; identity is its address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Host {
    pub address: String,
    pub role: Role,
}

impl Host {
    pub fn coordinator(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            role: Role::Coordinator,
        }
    }

    pub fn worker(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            role: Role::Worker,
        }
    }
}

impl Target for Host {
    fn id(&self) -> String {
        self.address.clone()
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Shared SSH credential for every host
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub private_key: PathBuf,
}

// Never print the key location, even at trace level.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"<redacted>")
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Ordered set of hosts plus the credential used to reach them
///
/// Coordinators always come first. There is at least one coordinator and
/// no address appears twice.
#[derive(Debug, Clone)]
pub struct Inventory {
    hosts: Vec<Host>,
    credentials: Credentials,
}

impl Inventory {
    /// Build and validate an inventory from role address lists
    pub fn new(
        coordinators: Vec<String>,
        workers: Vec<String>,
        credentials: Credentials,
    ) -> Result<Self, BootstrapError> {
        if coordinators.is_empty() {
            return Err(BootstrapError::Inventory(
                "at least one coordinator address is required".to_string(),
            ));
        }
        if credentials.username.trim().is_empty() {
            return Err(BootstrapError::Inventory(
                "username cannot be empty".to_string(),
            ));
        }

        let hosts: Vec<Host> = coordinators
            .into_iter()
            .map(Host::coordinator)
            .chain(workers.into_iter().map(Host::worker))
            .collect();

        let mut seen = HashSet::new();
        for host in &hosts {
            let address = host.address.trim();
            if address.is_empty() {
                return Err(BootstrapError::Inventory(
                    "host addresses cannot be empty".to_string(),
                ));
            }
            if address != host.address {
                return Err(BootstrapError::Inventory(format!(
                    "host address '{}' has surrounding whitespace",
                    host.address
                )));
            }
            if !seen.insert(address) {
                return Err(BootstrapError::Inventory(format!(
                    "host '{}' is listed more than once",
                    address
                )));
            }
        }

        Ok(Self { hosts, credentials })
    }

    /// All hosts, coordinators first
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Hosts with the given role, in inventory order
    pub fn with_role(&self, role: Role) -> Vec<Host> {
        self.hosts.iter().filter(|h| h.role == role).cloned().collect()
    }

    pub fn coordinators(&self) -> Vec<Host> {
        self.with_role(Role::Coordinator)
    }

    pub fn workers(&self) -> Vec<Host> {
        self.with_role(Role::Worker)
    }

    /// The coordinator that initializes the swarm
    pub fn primary_coordinator(&self) -> &Host {
        // Validated non-empty and sorted coordinators-first at construction
        &self.hosts[0]
    }

    /// Coordinators other than the primary; they join as managers
    pub fn secondary_coordinators(&self) -> Vec<Host> {
        self.coordinators().into_iter().skip(1).collect()
    }
}
