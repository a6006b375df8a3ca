//! Phase plan - which steps run where, in which order

use crate::config::ClusterConfig;
use crate::inventory::{Host, Inventory};
use crate::remote::RemoteExecutor;
use crate::steps::{
    DeployVisualizerService, DestroyExistingCluster, InitializeCoordinator,
    InstallContainerRuntime, JoinSwarm, JoinTokens, OpenCoordinatorPorts, RetrieveJoinToken,
    SystemUpgrade,
};
use declarative::{ExecutionMode, PlannedStep, RunOptions};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Bootstrap phases, in the only order they may be entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Idle,
    Destroy,
    Upgrade,
    Runtime,
    Coordinator,
    Token,
    Deploy,
    ManagerJoin,
    WorkerJoin,
    Done,
    Failed,
}

impl Phase {
    /// Next phase on success; terminal phases map to themselves
    pub fn successor(self) -> Self {
        match self {
            Self::Idle => Self::Destroy,
            Self::Destroy => Self::Upgrade,
            Self::Upgrade => Self::Runtime,
            Self::Runtime => Self::Coordinator,
            Self::Coordinator => Self::Token,
            Self::Token => Self::Deploy,
            Self::Deploy => Self::ManagerJoin,
            Self::ManagerJoin => Self::WorkerJoin,
            Self::WorkerJoin | Self::Done => Self::Done,
            Self::Failed => Self::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Phases that hand a join token to nodes
    pub fn requires_token(self) -> bool {
        matches!(self, Self::ManagerJoin | Self::WorkerJoin)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Destroy => "DestroyPhase",
            Self::Upgrade => "UpgradePhase",
            Self::Runtime => "RuntimePhase",
            Self::Coordinator => "CoordinatorPhase",
            Self::Token => "TokenPhase",
            Self::Deploy => "DeployPhase",
            Self::ManagerJoin => "ManagerJoinPhase",
            Self::WorkerJoin => "WorkerJoinPhase",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which optional phases the operator asked for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    pub upgrade: bool,
    pub destroy: bool,
}

/// Steps belonging to one phase
#[derive(Debug)]
pub struct PhasePlan {
    pub phase: Phase,
    pub steps: Vec<PlannedStep<Host>>,
}

impl PhasePlan {
    fn new(phase: Phase, steps: Vec<PlannedStep<Host>>) -> Self {
        Self { phase, steps }
    }

    /// Number of (step, host) actions in this phase
    pub fn action_count(&self) -> usize {
        self.steps.iter().map(|s| s.targets.len()).sum()
    }
}

/// A full bootstrap run, ready to execute
#[derive(Debug)]
pub struct ExecutionPlan {
    phases: Vec<PhasePlan>,
    tokens: Arc<JoinTokens>,
    run_options: RunOptions,
}

impl ExecutionPlan {
    /// Lay out every phase for this inventory
    ///
    /// Optional phases the operator did not ask for are absent, as is the
    /// manager join when there is a single coordinator.
    pub fn build(
        inventory: &Inventory,
        config: &ClusterConfig,
        options: PlanOptions,
        exec: Arc<RemoteExecutor>,
    ) -> Self {
        let tokens = Arc::new(JoinTokens::new());
        let all = inventory.hosts().to_vec();
        let primary = inventory.primary_coordinator().clone();
        let secondary = inventory.secondary_coordinators();
        let mut phases = Vec::new();

        if options.destroy {
            phases.push(PhasePlan::new(
                Phase::Destroy,
                vec![PlannedStep::new(
                    Box::new(DestroyExistingCluster::new(exec.clone())),
                    all.clone(),
                    ExecutionMode::Parallel,
                )],
            ));
        }

        if options.upgrade {
            phases.push(PhasePlan::new(
                Phase::Upgrade,
                vec![PlannedStep::new(
                    Box::new(SystemUpgrade::new(exec.clone())),
                    all.clone(),
                    ExecutionMode::Parallel,
                )],
            ));
        }

        phases.push(PhasePlan::new(
            Phase::Runtime,
            vec![PlannedStep::new(
                Box::new(InstallContainerRuntime::new(exec.clone())),
                all,
                ExecutionMode::Parallel,
            )],
        ));

        phases.push(PhasePlan::new(
            Phase::Coordinator,
            vec![
                PlannedStep::new(
                    Box::new(OpenCoordinatorPorts::new(exec.clone())),
                    vec![primary.clone()],
                    ExecutionMode::Serial,
                ),
                PlannedStep::new(
                    Box::new(InitializeCoordinator::new(exec.clone())),
                    vec![primary.clone()],
                    ExecutionMode::Serial,
                ),
            ],
        ));

        phases.push(PhasePlan::new(
            Phase::Token,
            vec![PlannedStep::new(
                Box::new(
                    RetrieveJoinToken::new(exec.clone(), tokens.clone())
                        .with_manager_token(!secondary.is_empty()),
                ),
                vec![primary.clone()],
                ExecutionMode::Serial,
            )],
        ));

        phases.push(PhasePlan::new(
            Phase::Deploy,
            vec![PlannedStep::new(
                Box::new(DeployVisualizerService::new(
                    exec.clone(),
                    config.visualizer.clone(),
                )),
                vec![primary.clone()],
                ExecutionMode::Serial,
            )],
        ));

        if !secondary.is_empty() {
            phases.push(PhasePlan::new(
                Phase::ManagerJoin,
                vec![PlannedStep::new(
                    Box::new(JoinSwarm::managers(exec.clone(), tokens.clone(), &primary)),
                    secondary,
                    ExecutionMode::Serial,
                )],
            ));
        }

        phases.push(PhasePlan::new(
            Phase::WorkerJoin,
            vec![PlannedStep::new(
                Box::new(JoinSwarm::workers(exec, tokens.clone(), &primary)),
                inventory.workers(),
                config.execution.worker_join,
            )],
        ));

        Self {
            phases,
            tokens,
            run_options: config.execution.run_options(),
        }
    }

    pub fn phases(&self) -> &[PhasePlan] {
        &self.phases
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhasePlan> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn tokens(&self) -> &JoinTokens {
        &self.tokens
    }

    pub fn run_options(&self) -> &RunOptions {
        &self.run_options
    }

    pub fn action_count(&self) -> usize {
        self.phases.iter().map(PhasePlan::action_count).sum()
    }
}
