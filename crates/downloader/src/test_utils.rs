//! Test helpers for exercising the downloader without a real blob store.

use crate::{
    planner::ByteRange,
    store::{BlobStore, BlobStoreError, ObjectMetadata, RemoteObject},
};
use bytes::Bytes;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

/// An in-memory [`BlobStore`] with programmable failures.
///
/// Failures are keyed by the starting byte of a range request, so a failure can be targeted at a
/// single partition of a plan.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<Mutex<HashMap<RemoteObject, Bytes>>>,
    range_failures: Arc<Mutex<HashMap<u64, BlobStoreError>>>,
    range_panics: Arc<Mutex<HashSet<u64>>>,
    head_delay: Option<Duration>,
    range_delay: Option<Duration>,
    range_requests: Arc<AtomicUsize>,
}

impl MemoryBlobStore {
    /// Stores `content` under `object`.
    pub fn insert(&self, object: RemoteObject, content: impl Into<Bytes>) {
        self.objects.lock().unwrap().insert(object, content.into());
    }

    /// Creates a store holding only `object`.
    pub fn with_object(object: RemoteObject, content: impl Into<Bytes>) -> Self {
        let store = Self::default();
        store.insert(object, content);
        store
    }

    /// Makes every range request starting at `start` fail with `err`.
    pub fn fail_range_at(&self, start: u64, err: BlobStoreError) {
        self.range_failures.lock().unwrap().insert(start, err);
    }

    /// Makes every range request starting at `start` panic.
    pub fn panic_range_at(&self, start: u64) {
        self.range_panics.lock().unwrap().insert(start);
    }

    /// Removes all programmed failures and panics.
    pub fn clear_failures(&self) {
        self.range_failures.lock().unwrap().clear();
        self.range_panics.lock().unwrap().clear();
    }

    /// Delays every metadata probe by `delay` before it is answered.
    pub fn with_head_delay(mut self, delay: Duration) -> Self {
        self.head_delay = Some(delay);
        self
    }

    /// Delays every range request by `delay` before it is answered.
    pub fn with_range_delay(mut self, delay: Duration) -> Self {
        self.range_delay = Some(delay);
        self
    }

    /// Number of range requests received so far.
    pub fn range_requests(&self) -> usize {
        self.range_requests.load(Ordering::SeqCst)
    }
}

impl BlobStore for MemoryBlobStore {
    async fn head_object(&self, object: &RemoteObject) -> Result<ObjectMetadata, BlobStoreError> {
        if let Some(delay) = self.head_delay {
            tokio::time::sleep(delay).await;
        }

        let objects = self.objects.lock().unwrap();
        let content = objects.get(object).ok_or(BlobStoreError::NotFound)?;
        Ok(ObjectMetadata { size: content.len() as u64 })
    }

    async fn get_object_range(
        &self,
        object: &RemoteObject,
        range: ByteRange,
    ) -> Result<Bytes, BlobStoreError> {
        self.range_requests.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.range_delay {
            tokio::time::sleep(delay).await;
        }

        let panics = self.range_panics.lock().unwrap().contains(&range.start());
        if panics {
            panic!("range request starting at {} panicked", range.start());
        }

        if let Some(err) = self.range_failures.lock().unwrap().get(&range.start()) {
            return Err(err.clone())
        }

        let content = self.objects.lock().unwrap().get(object).cloned();
        let content = content.ok_or(BlobStoreError::NotFound)?;

        let end = (range.end() + 1).min(content.len() as u64);
        if range.start() >= end {
            return Err(BlobStoreError::Other(format!("range {range} is not satisfiable")))
        }

        Ok(content.slice(range.start() as usize..end as usize))
    }
}

/// Returns `len` bytes of deterministic, non-repeating-looking content.
pub fn sample_content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
