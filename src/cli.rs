use crate::init::CONFIG;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// root directory path
    #[arg(short, long, default_value = "./")]
    pub root: PathBuf,

    /// Config file path related to `root`
    #[arg(short = 'C', long, default_value = CONFIG)]
    pub config: PathBuf,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Write a config template to fill in
    Init,

    /// Build the project and push its output to the deploy branch
    Deploy {
        /// Run everything up to the commit, then stop before pushing and keep the deploy folder
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.root.join(&self.config)
    }
}
