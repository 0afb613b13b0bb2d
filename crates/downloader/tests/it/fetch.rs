//! Tests fetching whole objects through the coordinator
use assert_matches::assert_matches;
use rangefetch_downloader::{
    partition_file_name, plan,
    test_utils::{sample_content, MemoryBlobStore},
    BlobStoreError, FetchCoordinator, FetchError, PartitionError, PlanConfig, RemoteObject,
    RunError, RunOutcome,
};
use std::{path::Path, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

fn object() -> RemoteObject {
    RemoteObject::new("video-processing", "underwater/free-diver.mp4")
}

/// Names of the files in `dir`, sorted.
fn files_in(dir: &Path) -> Vec<String> {
    let mut names = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names
}

/// Concatenates the partition files in byte order, skipping bytes already covered.
fn reassemble(dir: &Path) -> Vec<u8> {
    let mut out = Vec::new();
    for name in files_in(dir) {
        let (start, _) = name
            .trim_start_matches("part-")
            .trim_end_matches(".bin")
            .split_once('-')
            .unwrap();
        let start = start.parse::<usize>().unwrap();
        let bytes = std::fs::read(dir.join(&name)).unwrap();
        out.extend_from_slice(&bytes[out.len() - start..]);
    }
    out
}

#[tokio::test]
async fn test_all_partitions_succeed() {
    rangefetch_tracing::init_test_tracing();

    let content = sample_content(1000);
    let store = Arc::new(MemoryBlobStore::with_object(object(), content.clone()));
    let dir = tempfile::tempdir().unwrap();
    let coordinator = FetchCoordinator::new(Arc::clone(&store), object(), dir.path());

    let result = coordinator.run(&PlanConfig::new(3)).await.unwrap();

    assert_eq!(result.outcome(), RunOutcome::AllSucceeded);
    assert!(result.failed.is_empty());
    assert_eq!(result.succeeded.keys().copied().collect::<Vec<_>>(), plan(1000, 3).unwrap());
    assert_eq!(store.range_requests(), 3);

    let expected = plan(1000, 3).unwrap().iter().map(partition_file_name).collect::<Vec<_>>();
    assert_eq!(files_in(dir.path()), expected);

    for (partition, written) in &result.succeeded {
        let start = partition.range.start() as usize;
        let end = partition.range.end() as usize;
        assert_eq!(std::fs::read(&written.path).unwrap(), &content[start..=end]);
    }
    assert_eq!(reassemble(dir.path()), content);
}

#[tokio::test]
async fn test_one_transient_failure_is_reported() {
    rangefetch_tracing::init_test_tracing();

    let store = Arc::new(MemoryBlobStore::with_object(object(), sample_content(1000)));
    let partitions = plan(1000, 3).unwrap();
    let failing = partitions[2];
    store.fail_range_at(
        failing.range.start(),
        BlobStoreError::Transport("connection reset by peer".to_owned()),
    );
    let dir = tempfile::tempdir().unwrap();
    let coordinator = FetchCoordinator::new(store, object(), dir.path());

    let result = coordinator.run(&PlanConfig::new(3)).await.unwrap();

    assert_eq!(result.outcome(), RunOutcome::PartialFailure);
    assert_eq!(result.failed.len(), 1);
    assert_matches!(
        result.failed.get(&failing),
        Some(PartitionError::Fetch(FetchError::TransientTransport(_)))
    );
    assert_eq!(result.succeeded.keys().copied().collect::<Vec<_>>(), partitions[..2]);
    assert_eq!(result.retryable(), vec![failing]);

    // no partial or temporary file for the failed partition
    let expected = partitions[..2].iter().map(partition_file_name).collect::<Vec<_>>();
    assert_eq!(files_in(dir.path()), expected);
}

#[tokio::test]
async fn test_every_failure_is_listed() {
    let store = Arc::new(MemoryBlobStore::with_object(object(), sample_content(400)));
    let partitions = plan(400, 4).unwrap();
    store.fail_range_at(partitions[0].range.start(), BlobStoreError::Other("denied".to_owned()));
    store.fail_range_at(partitions[3].range.start(), BlobStoreError::Transport("503".to_owned()));
    let dir = tempfile::tempdir().unwrap();
    let coordinator = FetchCoordinator::new(store, object(), dir.path());

    let result = coordinator.run(&PlanConfig::new(4)).await.unwrap();

    assert_eq!(result.failed.keys().copied().collect::<Vec<_>>(), vec![partitions[0], partitions[3]]);
    assert_eq!(result.succeeded.len(), 2);
    assert_matches!(
        result.failed.get(&partitions[0]),
        Some(PartitionError::Fetch(FetchError::Unexpected(_)))
    );
    assert_eq!(result.retryable(), vec![partitions[3]]);
}

#[tokio::test]
async fn test_write_failure_does_not_abort_siblings() {
    let store = Arc::new(MemoryBlobStore::with_object(object(), sample_content(100)));
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("not-a-dir");
    std::fs::write(&root, b"occupied").unwrap();
    let coordinator = FetchCoordinator::new(store, object(), &root);

    let result = coordinator.run(&PlanConfig::new(2)).await.unwrap();

    assert_eq!(result.failed.len(), 2);
    assert!(result.failed.values().all(|err| matches!(err, PartitionError::Write(_))));
    assert!(result.retryable().is_empty());
}

#[tokio::test]
async fn test_missing_object_aborts_before_dispatch() {
    let store = Arc::new(MemoryBlobStore::default());
    let dir = tempfile::tempdir().unwrap();
    let coordinator = FetchCoordinator::new(Arc::clone(&store), object(), dir.path());

    let err = coordinator.run(&PlanConfig::new(3)).await.unwrap_err();

    assert_matches!(err, RunError::ObjectNotFound(obj) if obj == object());
    assert_eq!(store.range_requests(), 0);
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_invalid_plan_input_aborts_before_dispatch() {
    let store = Arc::new(MemoryBlobStore::with_object(object(), Vec::<u8>::new()));
    let dir = tempfile::tempdir().unwrap();
    let coordinator = FetchCoordinator::new(Arc::clone(&store), object(), dir.path());

    assert_matches!(coordinator.run(&PlanConfig::new(3)).await, Err(RunError::InvalidPlanInput(_)));

    store.insert(object(), sample_content(10));
    assert_matches!(coordinator.run(&PlanConfig::new(0)).await, Err(RunError::InvalidPlanInput(_)));
    assert_eq!(store.range_requests(), 0);
}

#[tokio::test]
async fn test_cancellation_stops_pending_reads() {
    let store = Arc::new(
        MemoryBlobStore::with_object(object(), sample_content(100))
            .with_range_delay(Duration::from_secs(30)),
    );
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let coordinator = FetchCoordinator::new(store, object(), dir.path())
        .with_cancellation(cancel.clone());

    let run = tokio::spawn(async move { coordinator.run(&PlanConfig::new(5)).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap().unwrap();

    assert_eq!(result.failed.len(), 5);
    assert!(result
        .failed
        .values()
        .all(|err| matches!(err, PartitionError::Fetch(FetchError::Cancelled))));
    assert!(files_in(dir.path()).is_empty());
}
