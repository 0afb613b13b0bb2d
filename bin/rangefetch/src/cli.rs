//! CLI definition and entrypoint to executable

use crate::{
    args::LogArgs,
    commands::{fetch, plan},
};
use clap::{Parser, Subcommand};
use rangefetch_cli_runner::CliRunner;
use rangefetch_downloader::remove_temp_files;
use rangefetch_tracing::FileWorkerGuard;
use std::ffi::OsString;
use tracing::{debug, warn};

/// Parses the process arguments and runs the selected command.
pub fn run() -> eyre::Result<()> {
    Cli::parse_args().run()
}

/// The main rangefetch cli interface.
///
/// This is the entrypoint to the executable.
#[derive(Debug, Parser)]
#[command(author, version, about = "Fetch an object as concurrently downloaded partitions", long_about = None)]
pub struct Cli {
    /// The command to run
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    logs: LogArgs,
}

impl Cli {
    /// Parsers only the default CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parsers only the default CLI arguments from the given iterator
    pub fn try_parse_args_from<I, T>(itr: I) -> Result<Self, clap::error::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(itr)
    }

    /// Execute the configured cli command.
    pub fn run(self) -> eyre::Result<()> {
        let _guard = self.init_tracing()?;
        debug!(
            target: "rangefetch::cli",
            dir = ?self.logs.log_file_directory,
            "Initialized tracing"
        );

        match self.command {
            Commands::Fetch(command) => {
                let output = command.output().to_path_buf();
                let res = CliRunner::try_default_runtime()?
                    .run_command_until_exit(|ctx| command.execute(ctx));

                // writes aborted by a second shutdown signal leave their staging files behind
                match remove_temp_files(&output) {
                    Ok(0) => {}
                    Ok(removed) => {
                        debug!(target: "rangefetch::cli", removed, ?output, "Removed staging files")
                    }
                    Err(err) => warn!(
                        target: "rangefetch::cli",
                        %err,
                        ?output,
                        "Failed to remove staging files"
                    ),
                }

                res
            }
            Commands::Plan(command) => command.execute(),
        }
    }

    /// Initializes tracing with the configured options.
    ///
    /// If file logging is enabled, this function returns a guard that must be kept alive to ensure
    /// that all logs are flushed to disk.
    pub fn init_tracing(&self) -> eyre::Result<Option<FileWorkerGuard>> {
        self.logs.init_tracing()
    }
}

/// Commands to be executed
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch an object into a directory, one file per partition.
    #[command(name = "fetch")]
    Fetch(fetch::Command),
    /// Print the partitions of an object of the given size.
    #[command(name = "plan")]
    Plan(plan::Command),
}
