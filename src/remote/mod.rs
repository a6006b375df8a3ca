//! Remote command execution
//!
//! A [`Transport`] knows how to run one command on one host and reports
//! the raw exit status. The [`RemoteExecutor`] layered on top applies the
//! uniform policy: sudo wrapping, default timeouts, and turning non-zero
//! exits into [`RemoteError::NonZeroExit`] unless the caller tolerates them.
//! It never retries; retry policy belongs to the step engine.

pub mod ssh;

pub use ssh::SshTransport;

use crate::error::RemoteError;
use crate::inventory::Host;
use declarative::{ExecutionMode, fan_out};
use std::sync::Arc;
use std::time::Duration;

/// Captured output of a finished remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout with surrounding whitespace and newlines removed
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Something that can run a shell command on a host
///
/// Implementations return `Ok` for any exit status; only failures to run
/// the command at all (connection, auth, timeout) are errors.
pub trait Transport: Send + Sync {
    fn run(
        &self,
        host: &Host,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, RemoteError>;
}

/// Per-command execution options
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Log output at debug level instead of info
    pub hide: bool,
    /// Return non-zero exits as output rather than an error
    pub warn: bool,
    /// Run through `sudo -n`
    pub sudo: bool,
    /// Overrides the executor's default timeout
    pub timeout: Option<Duration>,
    /// The command embeds a secret; keep it out of the log
    pub sensitive: bool,
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hidden(mut self) -> Self {
        self.hide = true;
        self
    }

    pub fn warn(mut self) -> Self {
        self.warn = true;
        self
    }

    pub fn sudo(mut self) -> Self {
        self.sudo = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Results of a group command, in visit order
///
/// Hosts that were never reached (serial group stopped early) are absent.
#[derive(Debug)]
pub struct GroupResults {
    entries: Vec<(Host, Result<CommandOutput, RemoteError>)>,
}

impl GroupResults {
    pub fn iter(&self) -> impl Iterator<Item = &(Host, Result<CommandOutput, RemoteError>)> {
        self.entries.iter()
    }

    /// Hosts the command was dispatched to
    pub fn reached(&self) -> usize {
        self.entries.len()
    }

    /// Addresses whose command failed
    pub fn failed_hosts(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, result)| result.is_err())
            .map(|(host, _)| host.address.as_str())
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(|(_, result)| result.is_ok())
    }
}

/// Uniform front end over a [`Transport`]
pub struct RemoteExecutor {
    transport: Arc<dyn Transport>,
    default_timeout: Option<Duration>,
    jobs: usize,
}

impl std::fmt::Debug for RemoteExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteExecutor")
            .field("default_timeout", &self.default_timeout)
            .field("jobs", &self.jobs)
            .finish_non_exhaustive()
    }
}

impl RemoteExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            default_timeout: None,
            jobs: 8,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Run one command on one host
    pub fn execute(
        &self,
        host: &Host,
        command: &str,
        opts: &ExecOptions,
    ) -> Result<CommandOutput, RemoteError> {
        let wrapped;
        let command = if opts.sudo {
            wrapped = sudo_wrap(command);
            wrapped.as_str()
        } else {
            command
        };
        let timeout = opts.timeout.or(self.default_timeout);

        if opts.sensitive {
            log::debug!("[{}] $ <command withheld>", host.address);
        } else {
            log::debug!("[{}] $ {}", host.address, command);
        }
        let output = self.transport.run(host, command, timeout)?;

        if opts.hide {
            log::debug!("[{}] exit {}", host.address, output.exit_code);
        } else {
            for line in output.stdout.lines() {
                log::info!("[{}] {}", host.address, line);
            }
        }

        if !output.success() && !opts.warn {
            return Err(RemoteError::NonZeroExit {
                host: host.address.clone(),
                code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// Run the same command on a group of hosts
    ///
    /// Parallel mode runs every host concurrently and waits for all of them.
    /// Serial mode visits hosts in order and stops at the first failure
    /// unless `continue_on_error` is set.
    pub fn execute_group(
        &self,
        hosts: &[Host],
        command: &str,
        opts: &ExecOptions,
        mode: ExecutionMode,
        continue_on_error: bool,
    ) -> GroupResults {
        let outcome = fan_out(
            hosts,
            mode,
            self.jobs,
            continue_on_error,
            |(_, result): &(Host, Result<CommandOutput, RemoteError>)| result.is_err(),
            |host| (host.clone(), self.execute(host, command, opts)),
        );

        match outcome {
            Ok(entries) => GroupResults { entries },
            // Pool creation failed; nothing ran anywhere
            Err(e) => GroupResults {
                entries: hosts
                    .iter()
                    .map(|host| {
                        let err = RemoteError::Connection {
                            host: host.address.clone(),
                            message: format!("could not dispatch command: {}", e),
                        };
                        (host.clone(), Err(err))
                    })
                    .collect(),
            },
        }
    }
}

/// Wrap a command so the whole pipeline runs as root without prompting
pub fn sudo_wrap(command: &str) -> String {
    format!("sudo -n sh -c {}", shell_quote(command))
}

/// Single-quote a string for a POSIX shell
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCluster;

    fn executor(cluster: &Arc<FakeCluster>) -> RemoteExecutor {
        RemoteExecutor::new(cluster.clone() as Arc<dyn Transport>)
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("echo hi"), "'echo hi'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_sudo_wrap() {
        assert_eq!(
            sudo_wrap("apt-get update && apt-get upgrade -y"),
            "sudo -n sh -c 'apt-get update && apt-get upgrade -y'"
        );
    }

    #[test]
    fn test_non_zero_exit_is_an_error_unless_warn() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.fail_command("node1", "false", 3, "nope");
        let exec = executor(&cluster);
        let host = Host::coordinator("node1");

        let err = exec.execute(&host, "false", &ExecOptions::new()).unwrap_err();
        assert_eq!(err.exit_code(), Some(3));

        let out = exec
            .execute(&host, "false", &ExecOptions::new().warn())
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stderr, "nope");
    }

    #[test]
    fn test_sudo_commands_are_wrapped() {
        let cluster = Arc::new(FakeCluster::new());
        let exec = executor(&cluster);
        exec.execute(
            &Host::worker("node2"),
            "usermod -aG docker ubuntu",
            &ExecOptions::new().sudo(),
        )
        .unwrap();

        assert_eq!(
            cluster.commands_for("node2"),
            vec!["sudo -n sh -c 'usermod -aG docker ubuntu'"]
        );
    }

    #[test]
    fn test_group_parallel_runs_every_host() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.set_unreachable("node2");
        let exec = executor(&cluster);
        let hosts = vec![
            Host::worker("node1"),
            Host::worker("node2"),
            Host::worker("node3"),
        ];

        let results = exec.execute_group(
            &hosts,
            "uptime",
            &ExecOptions::new(),
            ExecutionMode::Parallel,
            false,
        );

        assert_eq!(results.reached(), 3);
        assert_eq!(results.failed_hosts(), vec!["node2"]);
        let result_for = |address: &str| {
            results
                .iter()
                .find(|(host, _)| host.address == address)
                .map(|(_, result)| result)
        };
        assert!(result_for("node3").unwrap().is_ok());
        assert!(matches!(
            result_for("node2"),
            Some(Err(RemoteError::Connection { .. }))
        ));
    }

    #[test]
    fn test_group_serial_stops_at_first_failure() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.fail_command("node1", "uptime", 1, "boom");
        let exec = executor(&cluster);
        let hosts = vec![Host::worker("node1"), Host::worker("node2")];

        let results = exec.execute_group(
            &hosts,
            "uptime",
            &ExecOptions::new(),
            ExecutionMode::Serial,
            false,
        );
        assert_eq!(results.reached(), 1);
        assert!(cluster.commands_for("node2").is_empty());

        let results = exec.execute_group(
            &hosts,
            "uptime",
            &ExecOptions::new(),
            ExecutionMode::Serial,
            true,
        );
        assert_eq!(results.reached(), 2);
        assert!(!results.all_succeeded());
    }
}
