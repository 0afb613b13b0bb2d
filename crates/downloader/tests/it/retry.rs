//! Tests re-running only the failed partitions of an earlier run
use rangefetch_downloader::{
    partition_file_name, plan,
    test_utils::{sample_content, MemoryBlobStore},
    BlobStoreError, FetchCoordinator, PlanConfig, RemoteObject, RunOutcome,
};
use std::sync::Arc;

#[tokio::test]
async fn test_rerun_failed_partitions() {
    rangefetch_tracing::init_test_tracing();

    let object = RemoteObject::new("bucket", "object.bin");
    let content = sample_content(1000);
    let store = Arc::new(MemoryBlobStore::with_object(object.clone(), content.clone()));
    let partitions = plan(1000, 3).unwrap();
    store.fail_range_at(partitions[1].range.start(), BlobStoreError::Transport("reset".to_owned()));

    let dir = tempfile::tempdir().unwrap();
    let coordinator = FetchCoordinator::new(Arc::clone(&store), object, dir.path());

    let mut result = coordinator.run(&PlanConfig::new(3)).await.unwrap();
    assert_eq!(result.outcome(), RunOutcome::PartialFailure);
    assert_eq!(store.range_requests(), 3);

    store.clear_failures();
    let retry = coordinator.run_partitions(result.retryable()).await;

    // only the failed partition is fetched again
    assert_eq!(store.range_requests(), 4);
    assert_eq!(retry.outcome(), RunOutcome::AllSucceeded);
    assert_eq!(retry.succeeded.keys().copied().collect::<Vec<_>>(), vec![partitions[1]]);

    result.merge(retry);
    assert_eq!(result.outcome(), RunOutcome::AllSucceeded);
    assert_eq!(result.succeeded.len(), 3);

    for partition in &partitions {
        let path = dir.path().join(partition_file_name(partition));
        let start = partition.range.start() as usize;
        let end = partition.range.end() as usize;
        assert_eq!(std::fs::read(path).unwrap(), &content[start..=end]);
    }
}

#[tokio::test]
async fn test_arbitrary_partition_subset() {
    let object = RemoteObject::new("bucket", "object.bin");
    let store = Arc::new(MemoryBlobStore::with_object(object.clone(), sample_content(500)));
    let dir = tempfile::tempdir().unwrap();
    let coordinator = FetchCoordinator::new(Arc::clone(&store), object, dir.path());

    let partitions = plan(500, 5).unwrap();
    let subset = [partitions[4], partitions[0]];

    let result = coordinator.run_partitions(subset).await;

    assert_eq!(result.outcome(), RunOutcome::AllSucceeded);
    assert_eq!(result.succeeded.keys().copied().collect::<Vec<_>>(), vec![partitions[0], partitions[4]]);
    assert_eq!(store.range_requests(), 2);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}
