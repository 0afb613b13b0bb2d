//! Command that prints the partitions of an object without fetching anything.

use clap::Parser;
use rangefetch_downloader::{partition_file_name, plan, DEFAULT_WORKER_COUNT};

/// `rangefetch plan` command
#[derive(Debug, Parser)]
pub struct Command {
    /// Size of the object in bytes.
    #[arg(long, value_name = "BYTES")]
    size: u64,

    /// Number of partitions.
    #[arg(long, short, value_name = "N", default_value_t = DEFAULT_WORKER_COUNT)]
    workers: usize,
}

impl Command {
    /// Execute `plan` command
    pub fn execute(self) -> eyre::Result<()> {
        let partitions = plan(self.size, self.workers)?;

        for partition in &partitions {
            println!(
                "{}\t{}\t{}\t{}",
                partition.index,
                partition.range,
                partition.len(),
                partition_file_name(partition)
            );
        }

        Ok(())
    }
}
