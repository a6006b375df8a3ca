//! Execution engine - runs steps over target groups, serially or in parallel

use crate::context::ProgressCallback;
use crate::planner::PlannedStep;
use crate::step::{Step, Target};
use crate::types::{ExecutionMode, Outcome, Precondition, RetryConfig, RunOptions, StepResult};
use anyhow::Result;
use rayon::prelude::*;
use std::thread;

/// Run `task` for each target and collect the results in target order
///
/// In [`ExecutionMode::Parallel`] every target gets a task on a scoped pool
/// of at most `jobs` threads and the call blocks until all of them finish.
/// In [`ExecutionMode::Serial`] targets run one at a time and the loop stops
/// after the first result for which `is_failure` holds, unless
/// `continue_on_error` is set; targets after the stop produce no result.
pub fn fan_out<T, R, F, P>(
    targets: &[T],
    mode: ExecutionMode,
    jobs: usize,
    continue_on_error: bool,
    is_failure: P,
    task: F,
) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
    P: Fn(&R) -> bool,
{
    if mode == ExecutionMode::Parallel && targets.len() > 1 {
        let threads = jobs.clamp(1, targets.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

        return Ok(pool.install(|| targets.par_iter().map(&task).collect()));
    }

    let mut results = Vec::with_capacity(targets.len());
    for target in targets {
        let result = task(target);
        let failed = is_failure(&result);
        results.push(result);
        if failed && !continue_on_error && mode == ExecutionMode::Serial {
            break;
        }
    }
    Ok(results)
}

/// Run one step over its targets
pub fn run_step<T, S, P>(
    step: &S,
    targets: &[T],
    mode: ExecutionMode,
    opts: &RunOptions,
    progress: &P,
) -> Result<Vec<StepResult>>
where
    T: Target,
    S: Step<T> + ?Sized,
    P: ProgressCallback + ?Sized,
{
    progress.on_step_start(step.name(), targets.len(), mode);

    let results = fan_out(
        targets,
        mode,
        opts.jobs,
        opts.continue_on_error,
        StepResult::is_failure,
        |target| {
            let result = run_on_target(step, target, &opts.retry);
            progress.on_target_complete(&result);
            result
        },
    )?;

    progress.on_step_complete(step.name());
    Ok(results)
}

/// Run planned steps in order, stopping after the first step with a failure
///
/// Results of every step that ran are returned; the caller decides what a
/// failure means for the wider run.
pub fn run_steps<T, P>(
    steps: &[PlannedStep<T>],
    opts: &RunOptions,
    progress: &P,
) -> Result<Vec<StepResult>>
where
    T: Target,
    P: ProgressCallback + ?Sized,
{
    let mut all = Vec::new();
    for planned in steps {
        let results = run_step(
            planned.step.as_ref(),
            &planned.targets,
            planned.mode,
            opts,
            progress,
        )?;
        let failed = results.iter().any(StepResult::is_failure);
        all.extend(results);
        if failed {
            break;
        }
    }
    Ok(all)
}

/// Evaluate the precondition, then apply, for a single target
fn run_on_target<T, S>(step: &S, target: &T, retry: &RetryConfig) -> StepResult
where
    T: Target,
    S: Step<T> + ?Sized,
{
    let id = target.id();

    match step.precondition(target) {
        Ok(Precondition::Satisfied { reason }) => {
            log::debug!("{} on {}: skipped ({})", step.name(), id, reason);
            return StepResult::new(id, step.name(), Outcome::Skipped, reason);
        }
        Ok(Precondition::Unmet) => {}
        Err(e) => {
            return StepResult::new(id, step.name(), Outcome::Failed, format!("{:#}", e));
        }
    }

    match apply_with_retry(step, target, retry) {
        Ok(detail) => StepResult::new(id, step.name(), Outcome::Success, detail),
        Err(e) if step.tolerates(&e) => {
            log::debug!("{} on {}: tolerated error: {:#}", step.name(), id, e);
            StepResult::new(
                id,
                step.name(),
                Outcome::Success,
                format!("tolerated: {:#}", e),
            )
        }
        Err(e) => StepResult::new(id, step.name(), Outcome::Failed, format!("{:#}", e)),
    }
}

fn apply_with_retry<T, S>(step: &S, target: &T, retry: &RetryConfig) -> Result<String>
where
    T: Target,
    S: Step<T> + ?Sized,
{
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match step.apply(target) {
            Ok(detail) => return Ok(detail),
            Err(e) if attempt < max_attempts && step.is_retryable(&e) => {
                log::warn!(
                    "{} on {}: attempt {}/{} failed: {:#}. Retrying in {}s...",
                    step.name(),
                    target.id(),
                    attempt,
                    max_attempts,
                    e,
                    retry.delay.as_secs()
                );
                thread::sleep(retry.delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
