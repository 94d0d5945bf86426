//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    DeleteCommand, ListCommand, RerunCommand, RunCommand, ShowCommand, SyncCommand, ValidateCommand,
};
use std::ffi::OsString;

/// Run computational-biology pipelines against remote compute services
#[derive(Debug, Parser, Clone)]
#[command(name = "biopipe")]
#[command(version)]
#[command(about = "Approve and run computational-biology pipeline blueprints", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to engine configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Validate a blueprint and the selected node subset
    Validate(ValidateCommand),

    /// Approve a blueprint and run the resulting pipeline
    Run(RunCommand),

    /// List stored pipelines
    List(ListCommand),

    /// Show a stored pipeline
    Show(ShowCommand),

    /// Delete a stored pipeline
    Delete(DeleteCommand),

    /// Reconcile local pipelines with the persistence backend
    Sync(SyncCommand),

    /// Re-run a failed node of a stored pipeline
    Rerun(RerunCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
