//! Splits an object into contiguous byte-range partitions.

use crate::error::PlanError;
use std::{fmt, ops::RangeInclusive};
use tracing::trace;

/// Number of partitions used when nothing else is configured.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// An inclusive range of bytes `start..=end` within a remote object.
///
/// This is the only place a range is rendered, both for the range request sent to the blob store
/// and for the name of the file a partition is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// Creates the inclusive range `start..=end`.
    ///
    /// Returns `None` if `end < start`.
    pub const fn new(start: u64, end: u64) -> Option<Self> {
        if end < start {
            return None
        }
        Some(Self { start, end })
    }

    /// First byte of the range.
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Last byte of the range, inclusive.
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered by the range. Never zero.
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always `false`, a range covers at least one byte.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Value of an HTTP `Range` header requesting exactly these bytes.
    pub fn to_header_value(&self) -> String {
        format!("bytes={self}")
    }
}

impl From<ByteRange> for RangeInclusive<u64> {
    fn from(range: ByteRange) -> Self {
        range.start..=range.end
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A contiguous range of the remote object assigned to exactly one fetch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Partition {
    /// Position of the partition within its plan.
    pub index: usize,
    /// Bytes of the object covered by this partition.
    pub range: ByteRange,
}

impl Partition {
    /// Creates a new partition.
    pub const fn new(index: usize, range: ByteRange) -> Self {
        Self { index, range }
    }

    /// Number of bytes this partition covers.
    pub const fn len(&self) -> u64 {
        self.range.len()
    }

    /// Always `false`, see [`ByteRange::is_empty`].
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partition {} [{}]", self.index, self.range)
    }
}

/// Input to the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanConfig {
    /// Number of partitions, and therefore concurrent fetch tasks.
    pub worker_count: usize,
}

impl PlanConfig {
    /// Creates a config that splits objects into `worker_count` partitions.
    pub const fn new(worker_count: usize) -> Self {
        Self { worker_count }
    }

    /// Plans the partitions of an object of `total_size` bytes, see [`plan`].
    pub fn plan(&self, total_size: u64) -> Result<Vec<Partition>, PlanError> {
        plan(total_size, self.worker_count)
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self { worker_count: DEFAULT_WORKER_COUNT }
    }
}

/// Splits `[0, total_size)` into `worker_count` contiguous partitions.
///
/// Boundaries are computed on the exact quotient `total_size / worker_count`: a partition starts
/// at the floor of its lower boundary and ends just before the ceiling of its upper boundary. When
/// a boundary is fractional the two neighbouring partitions share that one byte, otherwise they
/// meet exactly. The last partition always ends at `total_size - 1`.
///
/// If the object has fewer bytes than `worker_count`, one single-byte partition is planned per
/// byte instead.
pub fn plan(total_size: u64, worker_count: usize) -> Result<Vec<Partition>, PlanError> {
    if total_size == 0 {
        return Err(PlanError::EmptyObject)
    }
    if worker_count == 0 {
        return Err(PlanError::NoWorkers)
    }

    let count = (worker_count as u64).min(total_size);
    let size = total_size as u128;
    let divisor = count as u128;

    let partitions = (0..count)
        .map(|i| {
            let i = i as u128;
            let start = (i * size / divisor) as u64;
            let end = if i + 1 == divisor {
                total_size - 1
            } else {
                ((i + 1) * size).div_ceil(divisor) as u64 - 1
            };
            // `size >= divisor` so each boundary is at least one byte past the previous one
            let range = ByteRange { start, end };
            Partition::new(i as usize, range)
        })
        .collect::<Vec<_>>();

    trace!(
        target: "rangefetch::planner",
        total_size,
        worker_count,
        partitions = partitions.len(),
        "Planned partitions"
    );

    Ok(partitions)
}
