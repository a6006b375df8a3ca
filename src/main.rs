mod cli;
mod commands;
mod config;
mod engine;
mod error;
mod inventory;
mod progress;
mod remote;
mod steps;
mod ui;

#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub inventory: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        inventory: cli.inventory,
    };

    match cli.command {
        Command::Swarm(args) => commands::swarm::run(&ctx, args),
        Command::Plan(flags) => commands::plan::run(&ctx, flags),
        Command::Status => commands::status::run(&ctx),
        Command::Exec(args) => commands::exec::run(&ctx, args),
        Command::Inventory => commands::inventory::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "swarmup", &mut io::stdout());
            Ok(())
        }
    }
}
