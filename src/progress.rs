//! Terminal progress for step execution

use colored::Colorize;
use declarative::{ExecutionMode, Outcome, ProgressCallback, StepResult};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// One bar per step, advanced as hosts finish
///
/// Hidden when quiet or when stderr is not a terminal, so piped and JSON
/// output stay clean.
pub struct StepProgress {
    enabled: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl StepProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            enabled: !quiet && console::Term::stderr().is_term(),
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        match self.bar.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

fn style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

impl ProgressCallback for StepProgress {
    fn on_step_start(&self, step: &str, targets: usize, mode: ExecutionMode) {
        log::debug!("{} on {} host(s), {}", step, targets, mode);
        if !self.enabled {
            return;
        }
        let pb = ProgressBar::new(targets as u64);
        pb.set_style(style());
        pb.set_prefix(step.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        self.with_bar(|slot| *slot = Some(pb));
    }

    fn on_target_complete(&self, result: &StepResult) {
        match result.outcome {
            Outcome::Failed => {
                log::warn!("{} on {} failed: {}", result.step, result.target, result.detail);
            }
            _ => log::info!("{} on {}: {}", result.step, result.target, result.detail),
        }
        self.with_bar(|slot| {
            if let Some(pb) = slot {
                if result.outcome == Outcome::Failed {
                    pb.suspend(|| {
                        println!("  {} {} ({})", "✗".red(), result.target, result.detail);
                    });
                }
                pb.set_message(result.target.clone());
                pb.inc(1);
            }
        });
    }

    fn on_step_complete(&self, _step: &str) {
        self.with_bar(|slot| {
            if let Some(pb) = slot.take() {
                pb.finish_and_clear();
            }
        });
    }
}
