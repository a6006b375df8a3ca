//! Join token retrieval and the per-run token slot
//!
//! Tokens are fetched from the primary coordinator once per run and stored
//! in write-once cells. Join steps read them; nothing else writes them.

use super::cmd;
use crate::error::BootstrapError;
use crate::inventory::Host;
use crate::remote::{ExecOptions, RemoteExecutor};
use anyhow::Result;
use declarative::Step;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};

const TOKEN_PATTERN: &str = r"^SWMTKN-1-[0-9a-z]+-[0-9a-z]+$";

fn looks_like_swarm_token(token: &str) -> bool {
    Regex::new(TOKEN_PATTERN)
        .map(|re| re.is_match(token))
        .unwrap_or(true)
}

/// Which join credential a node is handed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Worker,
    Manager,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Manager => "manager",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque swarm join credential
///
/// `Display` and `Debug` only show a short prefix.
#[derive(Clone, PartialEq, Eq)]
pub struct JoinToken(String);

impl JoinToken {
    /// Accept any non-empty token; odd-looking ones are logged, not rejected
    pub fn parse(raw: &str) -> Option<Self> {
        let token = raw.trim();
        if token.is_empty() {
            return None;
        }
        if !looks_like_swarm_token(token) {
            log::warn!("Join token does not look like a swarm token; using it anyway");
        }
        Some(Self(token.to_string()))
    }

    /// Full token text, for building the join command only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JoinToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(12).collect();
        write!(f, "{}…", prefix)
    }
}

impl fmt::Debug for JoinToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JoinToken({})", self)
    }
}

/// Write-once token cells shared by the token and join steps
#[derive(Debug, Default)]
pub struct JoinTokens {
    worker: OnceLock<JoinToken>,
    manager: OnceLock<JoinToken>,
}

impl JoinTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: TokenKind) -> Option<&JoinToken> {
        self.cell(kind).get()
    }

    pub fn worker(&self) -> Option<&JoinToken> {
        self.worker.get()
    }

    /// Store a token; a second write for the same kind is refused
    pub fn set(&self, kind: TokenKind, token: JoinToken) -> bool {
        self.cell(kind).set(token).is_ok()
    }

    fn cell(&self, kind: TokenKind) -> &OnceLock<JoinToken> {
        match kind {
            TokenKind::Worker => &self.worker,
            TokenKind::Manager => &self.manager,
        }
    }
}

/// Fetch join tokens from the primary coordinator
///
/// Always runs: tokens are not cached across runs.
#[derive(Debug)]
pub struct RetrieveJoinToken {
    exec: Arc<RemoteExecutor>,
    tokens: Arc<JoinTokens>,
    with_manager: bool,
}

impl RetrieveJoinToken {
    pub fn new(exec: Arc<RemoteExecutor>, tokens: Arc<JoinTokens>) -> Self {
        Self {
            exec,
            tokens,
            with_manager: false,
        }
    }

    /// Also fetch the manager token, for clusters with extra coordinators
    pub fn with_manager_token(mut self, enabled: bool) -> Self {
        self.with_manager = enabled;
        self
    }

    fn fetch(&self, host: &Host, kind: TokenKind) -> Result<(), BootstrapError> {
        let failed = |reason: String| BootstrapError::TokenRetrieval {
            host: host.address.clone(),
            reason,
        };

        let out = self
            .exec
            .execute(host, &cmd::join_token(kind.as_str()), &ExecOptions::new().hidden())
            .map_err(|e| failed(e.to_string()))?;
        let token = JoinToken::parse(&out.stdout)
            .ok_or_else(|| failed(format!("{} token output was empty", kind)))?;

        log::debug!("Retrieved {} join token {}", kind, token);
        if !self.tokens.set(kind, token) {
            return Err(failed(format!("{} token was already recorded", kind)));
        }
        Ok(())
    }
}

impl Step<Host> for RetrieveJoinToken {
    fn name(&self) -> &'static str {
        "RetrieveJoinToken"
    }

    fn description(&self) -> String {
        "Fetch the swarm join token".to_string()
    }

    fn apply(&self, host: &Host) -> Result<String> {
        self.fetch(host, TokenKind::Worker)?;
        if self.with_manager {
            self.fetch(host, TokenKind::Manager)?;
            return Ok("worker and manager tokens retrieved".to_string());
        }
        Ok("worker token retrieved".to_string())
    }

    fn idempotent(&self) -> bool {
        false
    }
}
