//! SSH transport backed by the system `ssh` client

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{CommandOutput, Transport};
use crate::config::{HostKeyPolicy, SshConfig};
use crate::error::RemoteError;
use crate::inventory::{Credentials, Host};

/// `ssh` exits with 255 when the client itself fails
const SSH_CLIENT_FAILURE: i32 = 255;

const AUTH_FAILURE_MARKERS: &[&str] = &[
    "Permission denied",
    "Too many authentication failures",
    "no mutual signature algorithm",
    "Load key",
];

/// Runs commands through `ssh user@host <command>`
#[derive(Debug, Clone)]
pub struct SshTransport {
    credentials: Credentials,
    port: u16,
    connect_timeout: Duration,
    host_key_policy: HostKeyPolicy,
    program: PathBuf,
}

impl SshTransport {
    pub fn new(credentials: Credentials, ssh: &SshConfig) -> Self {
        Self {
            credentials,
            port: ssh.port,
            connect_timeout: ssh.connect_timeout(),
            host_key_policy: ssh.strict_host_key_checking,
            program: PathBuf::from(shellexpand::tilde(&ssh.program).as_ref()),
        }
    }

    /// Build the argument vector for one command
    ///
    /// The remote command is passed as a single argument so the remote
    /// shell handles pipes and redirects.
    pub fn build_args(&self, host: &Host, command: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.credentials.private_key.display().to_string(),
            "-p".to_string(),
            self.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            format!(
                "StrictHostKeyChecking={}",
                self.host_key_policy.as_ssh_value()
            ),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            format!("{}@{}", self.credentials.username, host.address),
            "--".to_string(),
            command.to_string(),
        ]
    }

    fn spawn(&self, host: &Host, command: &str) -> Result<Child, RemoteError> {
        Command::new(&self.program)
            .args(self.build_args(host, command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RemoteError::Connection {
                host: host.address.clone(),
                message: format!("could not start {}: {}", self.program.display(), e),
            })
    }
}

impl Transport for SshTransport {
    fn run(
        &self,
        host: &Host,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, RemoteError> {
        let mut child = self.spawn(host, command)?;
        let io_error = |e: std::io::Error| RemoteError::Connection {
            host: host.address.clone(),
            message: e.to_string(),
        };

        // Drain both pipes concurrently so a chatty command cannot block on a full buffer
        let mut stdout = child.stdout.take().ok_or_else(|| {
            io_error(std::io::Error::other("stdout was not captured"))
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            io_error(std::io::Error::other("stderr was not captured"))
        })?;
        let out_handle = thread::spawn(move || -> std::io::Result<Vec<u8>> {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf)?;
            Ok(buf)
        });
        let err_handle = thread::spawn(move || -> std::io::Result<Vec<u8>> {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf)?;
            Ok(buf)
        });

        let status = match wait_with_timeout(&mut child, timeout).map_err(io_error)? {
            Some(status) => status,
            None => {
                let _ = join_reader(out_handle);
                let _ = join_reader(err_handle);
                return Err(RemoteError::Timeout {
                    host: host.address.clone(),
                    after: timeout.unwrap_or_default(),
                });
            }
        };

        let stdout = join_reader(out_handle).map_err(io_error)?;
        let stderr = join_reader(err_handle).map_err(io_error)?;

        // A signal-terminated client has no exit code
        let exit_code = status.code().unwrap_or(SSH_CLIENT_FAILURE);
        if exit_code == SSH_CLIENT_FAILURE {
            return Err(classify_client_failure(host, &stderr));
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

/// Wait for the child, killing it once `timeout` elapses
///
/// Returns `None` if the child was killed.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn join_reader(handle: thread::JoinHandle<std::io::Result<Vec<u8>>>) -> std::io::Result<String> {
    let buf = handle
        .join()
        .map_err(|_| std::io::Error::other("output reader thread panicked"))??;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Map an exit-255 client failure to an auth or connection error
pub fn classify_client_failure(host: &Host, stderr: &str) -> RemoteError {
    let message = stderr.trim().to_string();
    if AUTH_FAILURE_MARKERS.iter().any(|m| stderr.contains(m)) {
        RemoteError::Auth {
            host: host.address.clone(),
            message,
        }
    } else {
        RemoteError::Connection {
            host: host.address.clone(),
            message: if message.is_empty() {
                "ssh exited with status 255".to_string()
            } else {
                message
            },
        }
    }
}
