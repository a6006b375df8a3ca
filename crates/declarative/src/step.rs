//! Step trait for idempotent provisioning
//!
//! A Step is an action that converges one target toward a known state.
//! Before acting, the engine asks the step whether the target is already
//! there; if so, the step is skipped without side effects.

use crate::types::Precondition;
use anyhow::Result;
use std::fmt;

/// Something a step can be applied to
pub trait Target: Send + Sync {
    /// Stable identity of the target (e.g., a host address)
    fn id(&self) -> String;
}

/// Core trait for provisioning steps
///
/// # Example
///
/// ```ignore
/// use declarative::{Precondition, Step, Target};
///
/// #[derive(Debug)]
/// struct TouchFile;
///
/// impl<T: Target> Step<T> for TouchFile {
///     fn name(&self) -> &'static str {
///         "touch-file"
///     }
///
///     fn description(&self) -> String {
///         "Create /tmp/marker".into()
///     }
///
///     fn precondition(&self, _target: &T) -> anyhow::Result<Precondition> {
///         if std::path::Path::new("/tmp/marker").exists() {
///             Ok(Precondition::satisfied("marker exists"))
///         } else {
///             Ok(Precondition::Unmet)
///         }
///     }
///
///     fn apply(&self, _target: &T) -> anyhow::Result<String> {
///         std::fs::write("/tmp/marker", "")?;
///         Ok("created marker".into())
///     }
/// }
/// ```
pub trait Step<T: Target>: Send + Sync + fmt::Debug {
    /// Stable step name used in reports (e.g., "InitializeCoordinator")
    fn name(&self) -> &'static str;

    /// Human-readable description of what the step does
    fn description(&self) -> String;

    /// Check whether the target already satisfies this step
    ///
    /// An `Err` means the probe itself could not run; the engine reports
    /// that as a failure without attempting the action.
    fn precondition(&self, _target: &T) -> Result<Precondition> {
        Ok(Precondition::Unmet)
    }

    /// Run the side-effecting action, returning a short summary
    fn apply(&self, target: &T) -> Result<String>;

    /// Whether an error from `apply` should be absorbed as success
    fn tolerates(&self, _error: &anyhow::Error) -> bool {
        false
    }

    /// Whether an error from `apply` is transient and worth retrying
    fn is_retryable(&self, _error: &anyhow::Error) -> bool {
        false
    }

    /// Whether re-running the action on a converged target is harmless
    fn idempotent(&self) -> bool {
        true
    }
}

/// A boxed step for type-erased storage
pub type BoxedStep<T> = Box<dyn Step<T>>;
