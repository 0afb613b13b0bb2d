//! Concurrent, byte-range partitioned downloads of a single remote object.
//!
//! An object of known size is split into contiguous [`Partition`]s by [`plan`]. The
//! [`FetchCoordinator`] spawns one task per partition; each task reads its range from a
//! [`BlobStore`] and persists the bytes as a separate file through the [`PartitionWriter`].
//! Every partition reports exactly once and the run ends with an [`AggregateResult`].
//!
//! # Examples
//! ```
//! use rangefetch_downloader::{
//!     store::LocalBlobStore, FetchCoordinator, PlanConfig, RemoteObject, RunOutcome,
//! };
//! use std::sync::Arc;
//!
//! # async fn f() -> Result<(), Box<dyn std::error::Error + 'static>> {
//! // Containers are sub-directories of the store root.
//! let store = Arc::new(LocalBlobStore::new("/srv/objects"));
//! let object = RemoteObject::new("videos", "diving/short-film.mp4");
//!
//! let coordinator = FetchCoordinator::new(store, object, "/tmp/parts");
//! let result = coordinator.run(&PlanConfig::new(4)).await?;
//!
//! if result.outcome() == RunOutcome::PartialFailure {
//!     for (partition, err) in &result.failed {
//!         eprintln!("{partition}: {err}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod coordinator;
mod error;
mod fetcher;
mod planner;
pub mod store;
mod writer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use coordinator::{AggregateResult, FetchCoordinator, RunOutcome, RunStage};
pub use error::{FetchError, PartitionError, PlanError, RunError, WriteError};
pub use fetcher::fetch;
pub use planner::{plan, ByteRange, Partition, PlanConfig, DEFAULT_WORKER_COUNT};
pub use store::{BlobStore, BlobStoreError, ObjectMetadata, RemoteObject};
pub use writer::{partition_file_name, remove_temp_files, PartitionWriter, WrittenPartition};
