use std::fmt;

use serde::Deserialize;
use serde::Serialize;

pub type RddId = i32;
pub type ShuffleId = i32;
pub type BroadcastId = i64;
pub type AccumulatorId = i64;

/// Cluster-wide resource kinds the cleaner knows how to remove
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Rdd,
    Shuffle,
    Broadcast,
    Accumulator,
    Checkpoint,
}

impl fmt::Display for ResourceKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            ResourceKind::Rdd => "rdd",
            ResourceKind::Shuffle => "shuffle",
            ResourceKind::Broadcast => "broadcast",
            ResourceKind::Accumulator => "accumulator",
            ResourceKind::Checkpoint => "checkpoint",
        };
        f.write_str(name)
    }
}

/// Which resource to clean once its owning handle becomes unreachable.
///
/// Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CleanupTask {
    /// Cached partitions of a dataset
    Rdd(RddId),
    /// Materialized shuffle output
    Shuffle(ShuffleId),
    /// Broadcast replica set, origin copy included
    Broadcast(BroadcastId),
    /// Global accumulator registration
    Accumulator(AccumulatorId),
    /// Durable checkpoint artifacts of a dataset
    Checkpoint(RddId),
}

impl CleanupTask {
    pub fn kind(&self) -> ResourceKind {
        match self {
            CleanupTask::Rdd(_) => ResourceKind::Rdd,
            CleanupTask::Shuffle(_) => ResourceKind::Shuffle,
            CleanupTask::Broadcast(_) => ResourceKind::Broadcast,
            CleanupTask::Accumulator(_) => ResourceKind::Accumulator,
            CleanupTask::Checkpoint(_) => ResourceKind::Checkpoint,
        }
    }

    /// Resource id widened to `i64` for logging and error reporting
    pub fn id(&self) -> i64 {
        match *self {
            CleanupTask::Rdd(id) | CleanupTask::Shuffle(id) | CleanupTask::Checkpoint(id) => id as i64,
            CleanupTask::Broadcast(id) | CleanupTask::Accumulator(id) => id,
        }
    }
}

impl fmt::Display for CleanupTask {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.id())
    }
}
