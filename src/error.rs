//! Error types for remote execution and cluster bootstrap.
//!
//! Remote errors are categorized so that steps can declare which ones they
//! tolerate and the engine can decide which ones are worth retrying.

use std::time::Duration;
use thiserror::Error;

/// Categories of remote command failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Host unreachable or SSH session could not be established
    Connection,
    /// Credential rejected by the host
    Auth,
    /// Command exceeded its time limit
    Timeout,
    /// Command ran and exited with a non-zero status
    NonZeroExit,
}

impl ErrorKind {
    /// Whether this failure is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection | Self::Timeout)
    }

    /// Get a user-friendly description of this error kind.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Connection => "Host unreachable",
            Self::Auth => "Authentication failed",
            Self::Timeout => "Command timed out",
            Self::NonZeroExit => "Command failed",
        }
    }
}

/// Errors surfaced by the remote executor.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The SSH session could not be established
    #[error("connection to {host} failed: {message}")]
    Connection { host: String, message: String },

    /// The host rejected the credential
    #[error("authentication to {host} failed: {message}")]
    Auth { host: String, message: String },

    /// The command did not finish in time and was killed
    #[error("command on {host} timed out after {}s", .after.as_secs())]
    Timeout { host: String, after: Duration },

    /// The command exited with a non-zero status
    #[error("command on {host} exited with status {code}: {}", summarize(.stderr))]
    NonZeroExit {
        host: String,
        code: i32,
        stderr: String,
    },
}

impl RemoteError {
    /// Get the error kind for policy decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::NonZeroExit { .. } => ErrorKind::NonZeroExit,
        }
    }

    /// Captured stderr, for `NonZeroExit` errors.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Exit status, for `NonZeroExit` errors.
    #[cfg(test)]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Errors that abort a bootstrap run.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The coordinator did not produce a usable join token
    #[error("could not retrieve join token from {host}: {reason}")]
    TokenRetrieval { host: String, reason: String },

    /// A precondition probe could not be executed
    #[error("precondition check for {step} on {host} could not run")]
    PreconditionCheck {
        step: &'static str,
        host: String,
        #[source]
        source: RemoteError,
    },

    /// A phase finished with at least one failed host
    #[error("phase {phase} failed on {}", .hosts.join(", "))]
    PhaseFailed { phase: String, hosts: Vec<String> },

    /// The inventory violates a structural rule
    #[error("invalid inventory: {0}")]
    Inventory(String),
}

/// Last non-empty line of stderr, which is where CLIs put the actual reason.
fn summarize(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("(no output)")
}
