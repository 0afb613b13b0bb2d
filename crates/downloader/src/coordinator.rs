//! Runs the fetch and write of every partition concurrently and aggregates their outcomes.

use crate::{
    error::{FetchError, PartitionError, RunError},
    fetcher::fetch,
    planner::{Partition, PlanConfig},
    store::{BlobStore, BlobStoreError, RemoteObject},
    writer::{PartitionWriter, WrittenPartition},
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    path::PathBuf,
    sync::Arc,
    time::Instant,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Phases of a single coordinator run. A run only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStage {
    /// Probing the object size and computing partitions.
    Planning,
    /// Spawning one task per partition.
    Dispatching,
    /// Waiting for every task to report.
    AwaitingCompletion,
    /// Sorting outcomes into successes and failures.
    Aggregating,
    /// The aggregate result is final.
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::Planning => "planning",
            Self::Dispatching => "dispatching",
            Self::AwaitingCompletion => "awaiting-completion",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
        };
        f.write_str(stage)
    }
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every partition was fetched and written.
    AllSucceeded,
    /// At least one partition failed.
    PartialFailure,
}

/// Outcome of every partition of a run.
#[derive(Debug, Default)]
pub struct AggregateResult {
    /// Partitions that were fetched and written.
    pub succeeded: BTreeMap<Partition, WrittenPartition>,
    /// Partitions that failed, with the reason.
    pub failed: BTreeMap<Partition, PartitionError>,
}

impl AggregateResult {
    /// [`RunOutcome::AllSucceeded`] if no partition failed.
    pub fn outcome(&self) -> RunOutcome {
        if self.failed.is_empty() {
            RunOutcome::AllSucceeded
        } else {
            RunOutcome::PartialFailure
        }
    }

    /// Failed partitions that may succeed when run again.
    pub fn retryable(&self) -> Vec<Partition> {
        self.failed.iter().filter(|(_, err)| err.is_retryable()).map(|(p, _)| *p).collect()
    }

    /// Total number of bytes written by the successful partitions.
    pub fn total_bytes(&self) -> u64 {
        self.succeeded.values().map(|written| written.bytes).sum()
    }

    /// Folds the result of a later run over the same object into this one.
    ///
    /// Partitions present in `later` take the outcome they had there.
    pub fn merge(&mut self, later: Self) {
        for (partition, written) in later.succeeded {
            self.failed.remove(&partition);
            self.succeeded.insert(partition, written);
        }
        for (partition, err) in later.failed {
            self.succeeded.remove(&partition);
            self.failed.insert(partition, err);
        }
    }

    fn record(&mut self, partition: Partition, outcome: Result<WrittenPartition, PartitionError>) {
        match outcome {
            Ok(written) => {
                self.succeeded.insert(partition, written);
            }
            Err(err) => {
                self.failed.insert(partition, err);
            }
        }
    }
}

/// Outcome reported by the task of one partition.
#[derive(Debug)]
struct FetchResult {
    partition: Partition,
    outcome: Result<WrittenPartition, PartitionError>,
}

/// Fetches an object from a [`BlobStore`] as concurrently downloaded partitions.
///
/// The store handle is shared read-only by all tasks of a run. Every partition is written to its
/// own file, so tasks never contend on a destination.
#[derive(Debug)]
pub struct FetchCoordinator<S> {
    store: Arc<S>,
    object: RemoteObject,
    writer: PartitionWriter,
    cancel: CancellationToken,
}

impl<S: BlobStore> FetchCoordinator<S> {
    /// Creates a coordinator fetching `object` from `store` into `destination`.
    pub fn new(store: Arc<S>, object: RemoteObject, destination: impl Into<PathBuf>) -> Self {
        Self {
            store,
            object,
            writer: PartitionWriter::new(destination),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` to stop partitions that have not issued their read yet.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Probes the object size and plans its partitions.
    ///
    /// Fails if the object does not exist, the plan input is invalid or the run is cancelled
    /// before the probe answers. Nothing is dispatched.
    pub async fn plan(&self, config: &PlanConfig) -> Result<Vec<Partition>, RunError> {
        trace!(
            target: "rangefetch::coordinator",
            stage = %RunStage::Planning,
            object = %self.object
        );

        let probe = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(RunError::Cancelled),
            probe = self.store.head_object(&self.object) => probe,
        };
        let metadata = probe.map_err(|err| match err {
            BlobStoreError::NotFound => RunError::ObjectNotFound(self.object.clone()),
            err => RunError::Probe { object: self.object.clone(), source: FetchError::from(err) },
        })?;

        Ok(config.plan(metadata.size)?)
    }

    /// Plans the object and fetches every partition.
    pub async fn run(&self, config: &PlanConfig) -> Result<AggregateResult, RunError> {
        let partitions = self.plan(config).await?;
        Ok(self.run_partitions(partitions).await)
    }

    /// Fetches and writes the given partitions, one task per partition.
    ///
    /// The partitions do not need to form a complete plan, which allows re-running only the
    /// partitions that failed before. Returns once every task has reported. A failing partition
    /// never stops the others and appears in [`AggregateResult::failed`].
    pub async fn run_partitions(
        &self,
        partitions: impl IntoIterator<Item = Partition>,
    ) -> AggregateResult {
        let started = Instant::now();
        let partitions = partitions.into_iter().collect::<BTreeSet<_>>();

        trace!(
            target: "rangefetch::coordinator",
            stage = %RunStage::Dispatching,
            partitions = partitions.len()
        );
        let mut tasks = JoinSet::new();
        let mut owners = HashMap::with_capacity(partitions.len());
        for partition in partitions.iter().copied() {
            let store = Arc::clone(&self.store);
            let object = self.object.clone();
            let writer = self.writer.clone();
            let cancel = self.cancel.clone();

            let handle = tasks.spawn(async move {
                let outcome = fetch_and_write(&*store, &object, &writer, &cancel, &partition).await;
                FetchResult { partition, outcome }
            });
            owners.insert(handle.id(), partition);
        }

        trace!(target: "rangefetch::coordinator", stage = %RunStage::AwaitingCompletion);
        let mut results = Vec::with_capacity(partitions.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, result)) => results.push(result),
                Err(err) => {
                    // a task that did not complete took its partition with it
                    let Some(partition) = owners.get(&err.id()).copied() else { continue };
                    warn!(
                        target: "rangefetch::coordinator",
                        %partition,
                        %err,
                        "Fetch task did not complete"
                    );
                    results.push(FetchResult {
                        partition,
                        outcome: Err(PartitionError::Panicked(err.to_string())),
                    });
                }
            }
        }

        trace!(target: "rangefetch::coordinator", stage = %RunStage::Aggregating);
        let mut aggregate = AggregateResult::default();
        for FetchResult { partition, outcome } in results {
            if let Err(err) = &outcome {
                debug!(target: "rangefetch::coordinator", %partition, %err, "Partition failed");
            }
            aggregate.record(partition, outcome);
        }

        debug!(
            target: "rangefetch::coordinator",
            stage = %RunStage::Done,
            object = %self.object,
            succeeded = aggregate.succeeded.len(),
            failed = aggregate.failed.len(),
            bytes = aggregate.total_bytes(),
            elapsed = ?started.elapsed(),
            "Fetch run finished"
        );

        aggregate
    }
}

/// Work of the task owning `partition`: read the range, then persist it.
async fn fetch_and_write<S: BlobStore>(
    store: &S,
    object: &RemoteObject,
    writer: &PartitionWriter,
    cancel: &CancellationToken,
    partition: &Partition,
) -> Result<WrittenPartition, PartitionError> {
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled.into())
    }

    let payload = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(FetchError::Cancelled.into()),
        payload = fetch(store, object, partition) => payload?,
    };

    Ok(writer.write(partition, &payload).await?)
}
