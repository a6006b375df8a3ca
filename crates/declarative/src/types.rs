//! Core types for step execution

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Result of checking a step's precondition against one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precondition {
    /// The target is already in the state the step would produce
    Satisfied { reason: String },
    /// The step's action still needs to run
    Unmet,
}

impl Precondition {
    /// Shorthand for a satisfied precondition
    pub fn satisfied(reason: impl Into<String>) -> Self {
        Self::Satisfied {
            reason: reason.into(),
        }
    }

    /// Check if the precondition already holds
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }
}

/// Outcome of running one step on one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The action ran (or a tolerated error was absorbed)
    Success,
    /// The precondition already held; nothing ran
    Skipped,
    /// The precondition probe or the action failed
    Failed,
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Per-target, per-step record produced by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Identity of the target (a host address)
    pub target: String,
    /// Name of the step that produced this result
    pub step: String,
    pub outcome: Outcome,
    /// Human-readable detail: skip reason, action summary or error chain
    pub detail: String,
}

impl StepResult {
    pub fn new(
        target: impl Into<String>,
        step: impl Into<String>,
        outcome: Outcome,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            step: step.into(),
            outcome,
            detail: detail.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure()
    }
}

/// How a step or command fans out over its targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One target at a time, in order; stops at the first failure
    #[default]
    Serial,
    /// All targets concurrently; waits for every target to finish
    Parallel,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => f.write_str("serial"),
            Self::Parallel => f.write_str("parallel"),
        }
    }
}

/// Retry policy for step actions
///
/// Only errors the step classifies as retryable are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl RetryConfig {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Build from a retry count (attempts after the first)
    pub fn with_retries(retries: u32, delay: Duration) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            delay,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::none()
    }
}

/// Options for running a step over a group of targets
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Upper bound on concurrent tasks in parallel mode
    pub jobs: usize,
    /// Keep going after a failure in serial mode
    pub continue_on_error: bool,
    pub retry: RetryConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            jobs: 8,
            continue_on_error: false,
            retry: RetryConfig::none(),
        }
    }
}

/// Counts of outcomes across a set of results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeSummary {
    /// Tally a slice of results
    pub fn from_results(results: &[StepResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.add(result.outcome);
        }
        summary
    }

    pub fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.succeeded += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: &OutcomeSummary) {
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_attempts() {
        assert_eq!(RetryConfig::none().max_attempts, 1);
        assert_eq!(
            RetryConfig::with_retries(2, Duration::from_secs(1)).max_attempts,
            3
        );
        assert_eq!(
            RetryConfig::with_retries(u32::MAX, Duration::ZERO).max_attempts,
            u32::MAX
        );
    }

    #[test]
    fn test_outcome_summary() {
        let results = vec![
            StepResult::new("a", "s", Outcome::Success, ""),
            StepResult::new("b", "s", Outcome::Skipped, "already done"),
            StepResult::new("c", "s", Outcome::Failed, "boom"),
        ];
        let summary = OutcomeSummary::from_results(&results);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_execution_mode_serde() {
        let mode: ExecutionMode = serde_json::from_str("\"parallel\"").unwrap();
        assert_eq!(mode, ExecutionMode::Parallel);
        assert_eq!(ExecutionMode::default(), ExecutionMode::Serial);
    }
}
