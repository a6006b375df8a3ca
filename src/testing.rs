//! In-memory cluster used by tests in place of SSH
//!
//! Interprets the docker and shell commands the steps issue and keeps
//! enough per-host state (runtime installed, swarm membership, services)
//! for preconditions to observe the effect of earlier actions.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::RemoteError;
use crate::inventory::Host;
use crate::remote::{CommandOutput, Transport};

pub const WORKER_TOKEN: &str = "SWMTKN-1-3pu6hszjas19xyp7ghgosyx9k8atbfcr8p2is99znpy26u2lkl-1awxwuwd3z9j1z3puu7rcgdbx";
pub const MANAGER_TOKEN: &str = "SWMTKN-1-3pu6hszjas19xyp7ghgosyx9k8atbfcr8p2is99znpy26u2lkl-7p73s1dx5in4tatdymyhg9hu2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Membership {
    #[default]
    None,
    Manager,
    Worker,
}

#[derive(Debug, Clone, Default)]
struct NodeState {
    docker: bool,
    membership: Membership,
    reject_rule: bool,
    /// Swarm state other than active/inactive, e.g. `error` or `locked`
    stuck: Option<String>,
}

#[derive(Debug)]
struct Injected {
    host: String,
    needle: String,
    code: i32,
    stderr: String,
}

#[derive(Debug, Default)]
struct State {
    nodes: HashMap<String, NodeState>,
    services: HashSet<String>,
    log: Vec<(String, String)>,
    injected: Vec<Injected>,
    timeouts: Vec<(String, String)>,
    unreachable: HashSet<String>,
    token_output: Option<String>,
}

/// Stateful fake swarm
#[derive(Debug, Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark hosts as already having the container runtime
    pub fn with_docker(self, hosts: &[&str]) -> Self {
        {
            let mut state = self.lock();
            for host in hosts {
                state.nodes.entry((*host).to_string()).or_default().docker = true;
            }
        }
        self
    }

    /// Make a command containing `needle` exit with `code` on `host`
    pub fn fail_command(&self, host: &str, needle: &str, code: i32, stderr: &str) {
        self.lock().injected.push(Injected {
            host: host.to_string(),
            needle: needle.to_string(),
            code,
            stderr: stderr.to_string(),
        });
    }

    /// Make a command containing `needle` time out on `host`
    pub fn time_out(&self, host: &str, needle: &str) {
        self.lock()
            .timeouts
            .push((host.to_string(), needle.to_string()));
    }

    /// Leave `host` tied to a swarm in a state like `error`, `locked` or `pending`
    pub fn set_stuck(&self, host: &str, local_state: &str) {
        let mut state = self.lock();
        let node = state.nodes.entry(host.to_string()).or_default();
        node.docker = true;
        node.stuck = Some(local_state.to_string());
    }

    pub fn set_unreachable(&self, host: &str) {
        self.lock().unreachable.insert(host.to_string());
    }

    /// Override what `join-token worker -q` prints
    pub fn set_token_output(&self, output: &str) {
        self.lock().token_output = Some(output.to_string());
    }

    pub fn add_reject_rule(&self, host: &str) {
        self.lock()
            .nodes
            .entry(host.to_string())
            .or_default()
            .reject_rule = true;
    }

    pub fn membership(&self, host: &str) -> Membership {
        self.lock()
            .nodes
            .get(host)
            .map(|n| n.membership)
            .unwrap_or_default()
    }

    pub fn has_docker(&self, host: &str) -> bool {
        self.lock().nodes.get(host).is_some_and(|n| n.docker)
    }

    pub fn has_reject_rule(&self, host: &str) -> bool {
        self.lock().nodes.get(host).is_some_and(|n| n.reject_rule)
    }

    pub fn has_service(&self, name: &str) -> bool {
        self.lock().services.contains(name)
    }

    /// Commands issued to `host`, in order
    pub fn commands_for(&self, host: &str) -> Vec<String> {
        self.lock()
            .log
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Every command issued, as (host, command)
    pub fn all_commands(&self) -> Vec<(String, String)> {
        self.lock().log.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: 0,
    }
}

fn fail(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code: code,
    }
}

fn flag_value<'a>(command: &'a str, flag: &str) -> Option<&'a str> {
    let start = command.find(flag)? + flag.len();
    command[start..].split_whitespace().next()
}

impl Transport for FakeCluster {
    fn run(
        &self,
        host: &Host,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, RemoteError> {
        let mut state = self.lock();
        let address = host.address.clone();
        state.log.push((address.clone(), command.to_string()));

        if state.unreachable.contains(&address) {
            return Err(RemoteError::Connection {
                host: address,
                message: "ssh: connect to host port 22: No route to host".to_string(),
            });
        }

        if state
            .timeouts
            .iter()
            .any(|(h, needle)| *h == address && command.contains(needle.as_str()))
        {
            return Err(RemoteError::Timeout {
                host: address,
                after: timeout.unwrap_or(Duration::from_secs(900)),
            });
        }

        if let Some(injected) = state
            .injected
            .iter()
            .find(|i| i.host == address && command.contains(&i.needle))
        {
            return Ok(fail(injected.code, &injected.stderr));
        }

        let token_output = state.token_output.clone();
        let State {
            nodes, services, ..
        } = &mut *state;
        let node = nodes.entry(address.clone()).or_default();

        if command.contains("command -v docker") {
            return Ok(if node.docker { ok("/usr/bin/docker\n") } else { fail(1, "") });
        }
        if command.contains("get.docker.com") {
            node.docker = true;
            return Ok(ok("# Executing docker install script\n"));
        }
        if command.contains("usermod") || command.contains("apt-get") {
            return Ok(ok(""));
        }
        if command.contains("icmp-host-prohibited") {
            if command.contains("grep -q") {
                return Ok(if node.reject_rule { ok("") } else { fail(1, "") });
            }
            node.reject_rule = false;
            return Ok(ok(""));
        }

        if command.contains("docker") && !node.docker {
            return Ok(fail(127, "sh: 1: docker: not found"));
        }

        if command.contains("docker info") {
            if let Some(stuck) = &node.stuck {
                return Ok(ok(&format!("{}\n", stuck)));
            }
            let state = if node.membership == Membership::None {
                "inactive\n"
            } else {
                "active\n"
            };
            return Ok(ok(state));
        }
        if command.contains("docker swarm init") {
            if node.membership != Membership::None || node.stuck.is_some() {
                return Ok(fail(
                    1,
                    "Error response from daemon: This node is already part of a swarm.",
                ));
            }
            node.membership = Membership::Manager;
            return Ok(ok("Swarm initialized: current node is now a manager.\n"));
        }
        if command.contains("docker swarm join-token") {
            if node.membership != Membership::Manager {
                return Ok(fail(
                    1,
                    "Error response from daemon: This node is not a swarm manager.",
                ));
            }
            if command.contains("join-token manager") {
                return Ok(ok(&format!("{}\n", MANAGER_TOKEN)));
            }
            let token = token_output.unwrap_or_else(|| format!("{}\n", WORKER_TOKEN));
            return Ok(ok(&token));
        }
        if command.contains("docker swarm join") {
            if node.membership != Membership::None || node.stuck.is_some() {
                return Ok(fail(
                    1,
                    "Error response from daemon: This node is already part of a swarm.",
                ));
            }
            return Ok(match flag_value(command, "--token ") {
                Some(WORKER_TOKEN) => {
                    node.membership = Membership::Worker;
                    ok("This node joined a swarm as a worker.\n")
                }
                Some(MANAGER_TOKEN) => {
                    node.membership = Membership::Manager;
                    ok("This node joined a swarm as a manager.\n")
                }
                _ => fail(
                    1,
                    "Error response from daemon: invalid join token",
                ),
            });
        }
        if command.contains("docker swarm leave") {
            if node.stuck.take().is_some() {
                node.membership = Membership::None;
                return Ok(ok("Node left the swarm.\n"));
            }
            if node.membership == Membership::None {
                return Ok(fail(
                    1,
                    "Error response from daemon: This node is not part of a swarm",
                ));
            }
            if node.membership == Membership::Manager {
                services.clear();
            }
            node.membership = Membership::None;
            return Ok(ok("Node left the swarm.\n"));
        }
        if command.contains("docker service inspect") {
            let exists = flag_value(command, "inspect ").is_some_and(|n| services.contains(n));
            return Ok(if exists {
                ok("k3y5id\n")
            } else {
                fail(1, "Status: Error: no such service, Code: 1")
            });
        }
        if command.contains("docker service create") {
            if node.membership != Membership::Manager {
                return Ok(fail(
                    1,
                    "Error response from daemon: This node is not a swarm manager.",
                ));
            }
            if let Some(name) = flag_value(command, "--name=") {
                services.insert(name.to_string());
            }
            return Ok(ok("k3y5id\n"));
        }

        Ok(ok(""))
    }
}
