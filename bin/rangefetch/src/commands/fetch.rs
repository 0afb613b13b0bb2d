//! Command that fetches an object as partitions into a directory.

use crate::{args::StoreArgs, store::EndpointStore};
use backon::{BackoffBuilder, ExponentialBuilder};
use clap::Parser;
use eyre::bail;
use rangefetch_cli_runner::CliContext;
use rangefetch_config::{Config, RetryConfig};
use rangefetch_downloader::{AggregateResult, FetchCoordinator, Partition, RunOutcome};
use std::{
    collections::BTreeSet,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, warn};

/// `rangefetch fetch` command
#[derive(Debug, Parser)]
pub struct Command {
    #[command(flatten)]
    store: StoreArgs,

    /// Directory the partition files are written to. Created if missing.
    #[arg(long, short, value_name = "DIR")]
    output: PathBuf,

    /// Number of partitions, each fetched by its own task.
    ///
    /// Overrides `fetch.workers` of the config file.
    #[arg(long, short, value_name = "N")]
    workers: Option<usize>,

    /// Only fetch the partitions with these indices, e.g. the ones a previous run reported as
    /// failed. Indices refer to the plan for the same object and worker count.
    #[arg(long, value_name = "INDICES", value_delimiter = ',')]
    partitions: Vec<usize>,

    /// How many times partitions that failed with a retryable error are re-run.
    ///
    /// Overrides `retry.max_retries` of the config file.
    #[arg(long, value_name = "N")]
    retries: Option<usize>,

    /// The path to the configuration file to use.
    ///
    /// A default configuration is written there if the file does not exist.
    #[arg(long, value_name = "FILE", verbatim_doc_comment)]
    config: Option<PathBuf>,
}

impl Command {
    /// The directory partition files are written to.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Execute `fetch` command
    pub async fn execute(self, ctx: CliContext) -> eyre::Result<()> {
        let mut config = match &self.config {
            Some(path) => Config::from_path(path)?,
            None => Config::default(),
        };
        if let Some(workers) = self.workers {
            config.fetch.workers = workers;
        }
        if let Some(retries) = self.retries {
            config.retry.max_retries = retries;
        }

        let object = self.store.object();
        let store = EndpointStore::from_endpoint(self.store.endpoint.clone(), &config.http)?;
        let coordinator = FetchCoordinator::new(Arc::new(store), object.clone(), &self.output)
            .with_cancellation(ctx.cancel.clone());

        debug!(
            target: "rangefetch::cli",
            %object,
            endpoint = %self.store.endpoint,
            output = ?self.output,
            workers = config.fetch.workers,
            "Starting fetch"
        );

        let partitions = coordinator.plan(&config.fetch.plan_config()).await?;
        let partitions = select_partitions(partitions, &self.partitions)?;

        let mut result = coordinator.run_partitions(partitions).await;
        retry_failed(&coordinator, &ctx, &config.retry, &mut result).await;

        report(&mut io::stdout().lock(), &result)?;

        match result.outcome() {
            RunOutcome::AllSucceeded => {
                debug!(
                    target: "rangefetch::cli",
                    partitions = result.succeeded.len(),
                    bytes = result.total_bytes(),
                    "Fetch complete"
                );
                Ok(())
            }
            RunOutcome::PartialFailure => {
                let failed =
                    result.failed.keys().map(|p| p.index.to_string()).collect::<Vec<_>>().join(",");
                bail!(
                    "{} of {} partitions failed, re-run them with --partitions {failed}",
                    result.failed.len(),
                    result.failed.len() + result.succeeded.len()
                )
            }
        }
    }
}

/// Restricts `plan` to the partitions with the given indices. An empty selection keeps the whole
/// plan.
fn select_partitions(plan: Vec<Partition>, indices: &[usize]) -> eyre::Result<Vec<Partition>> {
    if indices.is_empty() {
        return Ok(plan)
    }

    let indices = indices.iter().copied().collect::<BTreeSet<_>>();
    if let Some(unknown) = indices.iter().find(|index| **index >= plan.len()) {
        bail!("partition {unknown} does not exist, the plan has {} partitions", plan.len())
    }

    Ok(plan.into_iter().filter(|partition| indices.contains(&partition.index)).collect())
}

/// Re-runs the retryable failures of `result` with exponential backoff until they succeed, the
/// retries are exhausted or the run is cancelled.
async fn retry_failed(
    coordinator: &FetchCoordinator<EndpointStore>,
    ctx: &CliContext,
    config: &RetryConfig,
    result: &mut AggregateResult,
) {
    let backoff = ExponentialBuilder::default()
        .with_min_delay(config.min_delay)
        .with_max_delay(config.max_delay)
        .with_max_times(config.max_retries)
        .build();

    for (attempt, delay) in backoff.enumerate() {
        let retryable = result.retryable();
        if retryable.is_empty() {
            return
        }

        warn!(
            target: "rangefetch::cli",
            attempt = attempt + 1,
            partitions = retryable.len(),
            ?delay,
            "Retrying failed partitions"
        );

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let later = coordinator.run_partitions(retryable).await;
        result.merge(later);
    }
}

/// Writes one line per partition to `out`, ordered by partition.
fn report(out: &mut impl Write, result: &AggregateResult) -> io::Result<()> {
    let mut lines = result
        .succeeded
        .iter()
        .map(|(partition, written)| (partition, format!("ok\t{}", written.path.display())))
        .chain(result.failed.iter().map(|(partition, err)| (partition, format!("failed\t{err}"))))
        .collect::<Vec<_>>();
    lines.sort_by_key(|(partition, _)| **partition);

    for (partition, line) in lines {
        writeln!(out, "{}\t{}\t{line}", partition.index, partition.range)?;
    }
    out.flush()
}
