//! Inventory configuration file
//!
//! Loaded from TOML, by default `~/.config/swarmup/inventory.toml`. When no
//! file exists the built-in three-node cluster is used.

use anyhow::{Context, Result};
use declarative::{ExecutionMode, RetryConfig, RunOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::inventory::{Credentials, Inventory};

/// Get the default inventory file path
pub fn default_inventory_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("swarmup").join("inventory.toml"))
}

// ============================================================================
// Main Config Schema
// ============================================================================

/// The whole cluster description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Remote login user on every host
    #[serde(default = "default_username")]
    pub username: String,

    /// Private key used for every host; `~` is expanded
    #[serde(default = "default_private_key")]
    pub private_key: String,

    #[serde(alias = "main", alias = "leaders", alias = "managers")]
    pub coordinators: RoleGroup,

    #[serde(default, alias = "followers")]
    pub workers: RoleGroup,

    #[serde(default)]
    pub ssh: SshConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub visualizer: VisualizerConfig,
}

impl Default for ClusterConfig {
    /// The three-node Raspberry Pi cluster the tool was first written for
    fn default() -> Self {
        Self {
            username: default_username(),
            private_key: default_private_key(),
            coordinators: RoleGroup {
                addresses: vec!["node1".to_string()],
            },
            workers: RoleGroup {
                addresses: vec!["node2".to_string(), "node3".to_string()],
            },
            ssh: SshConfig::default(),
            execution: ExecutionConfig::default(),
            visualizer: VisualizerConfig::default(),
        }
    }
}

impl ClusterConfig {
    /// Load from an explicit path, or the default location
    ///
    /// An explicit path must exist. A missing default file falls back to the
    /// built-in inventory.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = default_inventory_path()?;
                if !path.exists() {
                    log::info!(
                        "No inventory at {}, using built-in cluster definition",
                        path.display()
                    );
                    return Ok(Self::default());
                }
                Self::from_file(&path)
            }
        }
    }

    /// Parse a TOML inventory file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read inventory file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.ssh.connect_timeout_secs == 0 {
            anyhow::bail!("ssh.connect_timeout_secs must be greater than zero");
        }
        if self.execution.jobs == 0 {
            anyhow::bail!("execution.jobs must be greater than zero");
        }
        self.visualizer.validate()?;
        Ok(())
    }

    /// Private key path with `~` expanded
    pub fn private_key_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.private_key);
        PathBuf::from(expanded.as_ref())
    }

    /// Build the validated inventory model
    pub fn inventory(&self) -> Result<Inventory> {
        let credentials = Credentials {
            username: self.username.clone(),
            private_key: self.private_key_path(),
        };
        if !credentials.private_key.exists() {
            log::warn!("Configured private key does not exist; SSH may fail to authenticate");
        }
        let inventory = Inventory::new(
            self.coordinators.addresses.clone(),
            self.workers.addresses.clone(),
            credentials,
        )?;
        Ok(inventory)
    }
}

fn default_username() -> String {
    "ubuntu".to_string()
}

fn default_private_key() -> String {
    "~/.ssh/id_rsa".to_string()
}

/// Addresses for one role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleGroup {
    #[serde(default, alias = "address")]
    pub addresses: Vec<String>,
}

// ============================================================================
// SSH
// ============================================================================

/// Host key policy passed to `ssh -o StrictHostKeyChecking=`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    Yes,
    AcceptNew,
    No,
}

impl HostKeyPolicy {
    pub fn as_ssh_value(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::AcceptNew => "accept-new",
            Self::No => "no",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-command limit; 0 disables it
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_host_key_policy")]
    pub strict_host_key_checking: HostKeyPolicy,

    /// SSH client binary
    #[serde(default = "default_ssh_program")]
    pub program: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            strict_host_key_checking: default_host_key_policy(),
            program: default_ssh_program(),
        }
    }
}

impl SshConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

// System upgrades on small boards take a while.
fn default_command_timeout() -> u64 {
    900
}

fn default_host_key_policy() -> HostKeyPolicy {
    HostKeyPolicy::AcceptNew
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

// ============================================================================
// Execution
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// How workers join the swarm
    #[serde(default = "default_worker_join")]
    pub worker_join: ExecutionMode,

    /// Upper bound on concurrent hosts in parallel groups
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Keep going through a serial group after a host fails
    #[serde(default)]
    pub continue_on_error: bool,

    /// Extra attempts for connection failures and timeouts
    #[serde(default)]
    pub retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            worker_join: default_worker_join(),
            jobs: default_jobs(),
            continue_on_error: false,
            retries: 0,
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl ExecutionConfig {
    /// Engine options derived from this config
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            jobs: self.jobs,
            continue_on_error: self.continue_on_error,
            retry: RetryConfig::with_retries(
                self.retries,
                Duration::from_secs(self.retry_delay_secs),
            ),
        }
    }
}

fn default_worker_join() -> ExecutionMode {
    ExecutionMode::Parallel
}

fn default_jobs() -> usize {
    8
}

fn default_retry_delay() -> u64 {
    5
}

// ============================================================================
// Visualizer service
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizerConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    #[serde(default = "default_image")]
    pub image: String,

    /// Published port mapping, `published:target/proto`
    #[serde(default = "default_publish")]
    pub publish: String,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            image: default_image(),
            publish: default_publish(),
        }
    }
}

impl VisualizerConfig {
    pub fn validate(&self) -> Result<()> {
        let valid_name = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
        if !valid_name {
            anyhow::bail!("visualizer.name '{}' is not a valid service name", self.name);
        }
        if self.image.trim().is_empty() {
            anyhow::bail!("visualizer.image cannot be empty");
        }
        Ok(())
    }
}

fn default_service_name() -> String {
    "viz".to_string()
}

fn default_image() -> String {
    "alexellis2/visualizer-arm:latest".to_string()
}

fn default_publish() -> String {
    "8080:8080/tcp".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_matches_original_cluster() {
        let config = ClusterConfig::default();
        let inv = config.inventory().unwrap();
        assert_eq!(inv.primary_coordinator().address, "node1");
        assert_eq!(inv.workers().len(), 2);
        assert_eq!(inv.credentials().username, "ubuntu");
        assert_eq!(config.visualizer.name, "viz");
    }

    #[test]
    fn test_parse_minimal_file() {
        let config: ClusterConfig = toml::from_str(
            r#"
            [coordinators]
            addresses = ["10.0.0.1"]
            "#,
        )
        .unwrap();
        assert_eq!(config.username, "ubuntu");
        assert!(config.workers.addresses.is_empty());
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.execution.worker_join, ExecutionMode::Parallel);
        assert_eq!(config.ssh.strict_host_key_checking, HostKeyPolicy::AcceptNew);
    }

    #[test]
    fn test_legacy_role_names() {
        let config: ClusterConfig = toml::from_str(
            r#"
            username = "pi"
            [main]
            address = ["node1"]
            [followers]
            address = ["node2", "node3"]
            "#,
        )
        .unwrap();
        assert_eq!(config.coordinators.addresses, vec!["node1"]);
        assert_eq!(config.workers.addresses, vec!["node2", "node3"]);

        let config: ClusterConfig = toml::from_str(
            r#"
            [leaders]
            addresses = ["a"]
            "#,
        )
        .unwrap();
        assert_eq!(config.coordinators.addresses, vec!["a"]);
    }

    #[test]
    fn test_missing_coordinators_is_an_error() {
        let parsed: Result<ClusterConfig, _> = toml::from_str(
            r#"
            [workers]
            addresses = ["node2"]
            "#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_from_file_and_run_options() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            username = "admin"
            private_key = "/keys/cluster"

            [coordinators]
            addresses = ["m1"]

            [workers]
            addresses = ["w1", "w2"]

            [execution]
            worker_join = "serial"
            jobs = 2
            retries = 3
            retry_delay_secs = 0

            [ssh]
            command_timeout_secs = 0
            strict_host_key_checking = "yes"
            "#
        )
        .unwrap();

        let config = ClusterConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.private_key_path(), PathBuf::from("/keys/cluster"));
        assert_eq!(config.execution.worker_join, ExecutionMode::Serial);
        assert_eq!(config.ssh.command_timeout(), None);

        let opts = config.execution.run_options();
        assert_eq!(opts.jobs, 2);
        assert_eq!(opts.retry.max_attempts, 4);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClusterConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Could not read inventory file"));
    }

    #[test]
    fn test_validate_rejects_zero_jobs() {
        let mut config = ClusterConfig::default();
        config.execution.jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_service_name() {
        let mut config = ClusterConfig::default();
        config.visualizer.name = "bad name".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tilde_expansion() {
        let config = ClusterConfig::default();
        let path = config.private_key_path();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with(".ssh/id_rsa"));
    }
}
