//! Downstream collaborator contracts.
//!
//! The cleaner never removes cluster state itself; it asks the subsystem that
//! owns the resource to do it. Each call may fail with any crate error; the
//! cleaner reports the failure and drops the task.

use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tonic::async_trait;

use crate::AccumulatorId;
use crate::BroadcastId;
use crate::RddId;
use crate::Result;
use crate::ShuffleId;

/// Owner of cached dataset partitions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CacheCoordinator: Send + Sync + 'static {
    /// Removes all cached storage for `rdd_id` across the cluster.
    ///
    /// With `blocking` set, returns only after every storage owner acknowledged.
    async fn evict_cached(
        &self,
        rdd_id: RddId,
        blocking: bool,
    ) -> Result<()>;
}

/// Authority that tracks shuffle output locations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ShuffleTracker: Send + Sync + 'static {
    /// Whether the shuffle is still known. Unknown shuffles were removed by
    /// someone else and are skipped.
    async fn contains_shuffle(
        &self,
        shuffle_id: ShuffleId,
    ) -> bool {
        let _ = shuffle_id;
        true
    }

    async fn unregister_shuffle_metadata(
        &self,
        shuffle_id: ShuffleId,
    ) -> Result<()>;
}

/// Storage owners holding materialized shuffle blocks
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ShuffleStore: Send + Sync + 'static {
    async fn remove_shuffle_blocks(
        &self,
        shuffle_id: ShuffleId,
        blocking: bool,
    ) -> Result<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait BroadcastManager: Send + Sync + 'static {
    /// Removes the replicas of a broadcast; `remove_origin` also drops the copy
    /// held by the node that created it.
    async fn remove_broadcast_replicas(
        &self,
        broadcast_id: BroadcastId,
        remove_origin: bool,
        blocking: bool,
    ) -> Result<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccumulatorRegistry: Send + Sync + 'static {
    async fn remove_accumulator_registration(
        &self,
        acc_id: AccumulatorId,
    ) -> Result<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CheckpointStore: Send + Sync + 'static {
    /// Deletes the durable checkpoint artifacts written for `rdd_id`
    async fn delete_checkpoint_artifacts(
        &self,
        rdd_id: RddId,
    ) -> Result<()>;
}

/// Every subsystem the cleaner calls into
#[derive(Clone)]
pub struct Collaborators {
    pub cache: Arc<dyn CacheCoordinator>,
    pub shuffle_tracker: Arc<dyn ShuffleTracker>,
    pub shuffle_store: Arc<dyn ShuffleStore>,
    pub broadcasts: Arc<dyn BroadcastManager>,
    pub accumulators: Arc<dyn AccumulatorRegistry>,
    pub checkpoints: Arc<dyn CheckpointStore>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
