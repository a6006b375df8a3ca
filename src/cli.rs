use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "swarmup")]
#[command(version)]
#[command(about = "Bootstrap a Docker swarm over SSH", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Inventory file (default: ~/.config/swarmup/inventory.toml)
    #[arg(short, long, global = true, env = "SWARMUP_INVENTORY")]
    pub inventory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bring the cluster up: install docker, init the swarm, join workers
    Swarm(SwarmArgs),

    /// Show the phases and host actions a run would take
    Plan(PhaseFlags),

    /// Probe every host and report what is already in place
    Status,

    /// Run an ad-hoc command on a group of hosts
    Exec(ExecArgs),

    /// Show the resolved inventory
    Inventory,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Explicit yes/no switch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    Yes,
    #[default]
    No,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Self::Yes
    }
}

#[derive(Debug, Args)]
pub struct PhaseFlags {
    /// Upgrade OS packages on every host first
    #[arg(short, long, value_enum, default_value_t = Toggle::No)]
    pub upgrade: Toggle,

    /// Tear down any existing swarm first
    #[arg(short, long, value_enum, default_value_t = Toggle::No)]
    pub destroy: Toggle,
}

#[derive(Debug, Args)]
pub struct SwarmArgs {
    #[command(flatten)]
    pub flags: PhaseFlags,

    /// Skip the confirmation prompt for --destroy yes
    #[arg(short, long)]
    pub yes: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleFilter {
    Coordinator,
    Worker,
    All,
}

#[derive(Debug, Args)]
pub struct ExecArgs {
    /// Which hosts to run on
    #[arg(long, value_enum, default_value_t = RoleFilter::All)]
    pub role: RoleFilter,

    /// Run on every host at once instead of one after another
    #[arg(short, long)]
    pub parallel: bool,

    /// Run the command as root
    #[arg(long)]
    pub sudo: bool,

    /// Keep going after a host fails (serial mode)
    #[arg(long)]
    pub continue_on_error: bool,

    /// Per-host time limit in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Command to run, after `--`
    ///
    /// A single argument is handed to the remote shell as is, so pipes and
    /// redirects work. Several arguments are quoted one by one.
    #[arg(required = true, trailing_var_arg = true, num_args = 1..)]
    pub command: Vec<String>,
}
