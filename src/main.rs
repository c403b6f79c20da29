mod build;
mod cli;
mod config;
mod deploy;
mod error;
mod init;
mod utils;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::DeployConfig;
use deploy::{DeployOptions, DeployOutcome, Deployer};
use utils::{checker::check_git_installed, git::SystemGit};

#[rustfmt::skip]
fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::log::set_quiet(cli.quiet);
    let config_path = cli.config_path();

    match cli.command {
        Commands::Init => {
            init::new_config(&config_path)?;
        },
        Commands::Deploy { dry_run } => {
            let config = DeployConfig::from_path(&config_path)?;
            let git_path = check_git_installed()?;
            log!("deploy"; "using git at `{}`", git_path.display());

            let git = SystemGit;
            let outcome = Deployer::new(&config, &git, DeployOptions { dry_run }).run()?;
            report(&outcome);
        },
    };

    Ok(())
}

fn report(outcome: &DeployOutcome) {
    match outcome {
        DeployOutcome::Pushed { source_sha, commit } => {
            log!("deploy"; "deploy complete for commit `{source_sha}`, pushed `{commit}`");
        },
        DeployOutcome::NothingToCommit { source_sha } => {
            log!("deploy"; "commit `{source_sha}` is already deployed, nothing to push");
        },
        DeployOutcome::DryRun { source_sha, workspace, message } => {
            log!("deploy"; "dry run complete for commit `{source_sha}`, commit message:");
            message.lines().for_each(|line| log!("deploy"; "  {line}"));
            log!("deploy"; "deploy folder kept at `{}`", workspace.display());
        },
    }
}
