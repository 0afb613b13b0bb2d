use crate::{
    error::FetchError,
    planner::Partition,
    store::{BlobStore, RemoteObject},
};
use bytes::Bytes;
use tracing::trace;

/// Reads the bytes of `partition` from `store` with a single range request.
///
/// Failures are returned as-is: nothing is retried here, retrying is left to the caller. The
/// payload is only checked for its length, never for its content.
pub async fn fetch<S: BlobStore>(
    store: &S,
    object: &RemoteObject,
    partition: &Partition,
) -> Result<Bytes, FetchError> {
    trace!(target: "rangefetch::fetcher", %object, %partition, "Requesting range");

    let payload = store.get_object_range(object, partition.range).await?;

    if payload.len() as u64 != partition.len() {
        return Err(FetchError::Unexpected(format!(
            "requested {} bytes for range {}, received {}",
            partition.len(),
            partition.range,
            payload.len()
        )))
    }

    Ok(payload)
}
