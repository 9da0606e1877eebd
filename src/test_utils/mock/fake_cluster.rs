use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tonic::async_trait;

use crate::AccumulatorId;
use crate::AccumulatorRegistry;
use crate::BroadcastId;
use crate::BroadcastManager;
use crate::CacheCoordinator;
use crate::CheckpointStore;
use crate::CleanupTask;
use crate::Collaborators;
use crate::Error;
use crate::RddId;
use crate::ResourceKind;
use crate::Result;
use crate::ShuffleId;
use crate::ShuffleStore;
use crate::ShuffleTracker;

/// One collaborator call as seen by the fake cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    EvictCached { rdd_id: RddId, blocking: bool },
    UnregisterShuffle(ShuffleId),
    RemoveShuffleBlocks { shuffle_id: ShuffleId, blocking: bool },
    RemoveBroadcast { broadcast_id: BroadcastId, remove_origin: bool, blocking: bool },
    RemoveAccumulator(AccumulatorId),
    DeleteCheckpoint(RddId),
    /// Recorded when a call for `task` returns (after any injected delay)
    Returned(CleanupTask),
}

/// In-memory stand-in for every subsystem the cleaner calls into.
///
/// Records calls in order, and can be told to fail, panic, or stall for a
/// given task.
#[derive(Default)]
pub struct FakeCluster {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<CleanupTask>>,
    panicking: Mutex<HashSet<CleanupTask>>,
    delays: Mutex<HashMap<ResourceKind, Duration>>,
    removed_shuffles: Mutex<HashSet<ShuffleId>>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            cache: self.clone(),
            shuffle_tracker: self.clone(),
            shuffle_store: self.clone(),
            broadcasts: self.clone(),
            accumulators: self.clone(),
            checkpoints: self.clone(),
        }
    }

    pub fn fail_on(
        &self,
        task: CleanupTask,
    ) {
        self.failing.lock().insert(task);
    }

    pub fn panic_on(
        &self,
        task: CleanupTask,
    ) {
        self.panicking.lock().insert(task);
    }

    pub fn delay(
        &self,
        kind: ResourceKind,
        delay: Duration,
    ) {
        self.delays.lock().insert(kind, delay);
    }

    /// Makes the tracker forget a shuffle, as if it was removed elsewhere
    pub fn forget_shuffle(
        &self,
        shuffle_id: ShuffleId,
    ) {
        self.removed_shuffles.lock().insert(shuffle_id);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls that touched `task`, `Returned` markers excluded
    pub fn calls_for(
        &self,
        task: CleanupTask,
    ) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call_task(call) == Some(task))
            .collect()
    }

    pub fn returned(
        &self,
        task: CleanupTask,
    ) -> bool {
        self.calls.lock().contains(&Call::Returned(task))
    }

    async fn handle(
        &self,
        task: CleanupTask,
        call: Call,
    ) -> Result<()> {
        self.calls.lock().push(call);

        let delay = self.delays.lock().get(&task.kind()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let should_panic = self.panicking.lock().contains(&task);
        if should_panic {
            panic!("injected panic for {task}");
        }

        self.calls.lock().push(Call::Returned(task));

        if self.failing.lock().contains(&task) {
            return Err(Error::Fatal(format!("injected failure for {task}")));
        }
        Ok(())
    }
}

fn call_task(call: &Call) -> Option<CleanupTask> {
    match *call {
        Call::EvictCached { rdd_id, .. } => Some(CleanupTask::Rdd(rdd_id)),
        Call::UnregisterShuffle(id) => Some(CleanupTask::Shuffle(id)),
        Call::RemoveShuffleBlocks { shuffle_id, .. } => Some(CleanupTask::Shuffle(shuffle_id)),
        Call::RemoveBroadcast { broadcast_id, .. } => Some(CleanupTask::Broadcast(broadcast_id)),
        Call::RemoveAccumulator(id) => Some(CleanupTask::Accumulator(id)),
        Call::DeleteCheckpoint(id) => Some(CleanupTask::Checkpoint(id)),
        Call::Returned(_) => None,
    }
}

#[async_trait]
impl CacheCoordinator for FakeCluster {
    async fn evict_cached(
        &self,
        rdd_id: RddId,
        blocking: bool,
    ) -> Result<()> {
        self.handle(CleanupTask::Rdd(rdd_id), Call::EvictCached { rdd_id, blocking })
            .await
    }
}

#[async_trait]
impl ShuffleTracker for FakeCluster {
    async fn contains_shuffle(
        &self,
        shuffle_id: ShuffleId,
    ) -> bool {
        !self.removed_shuffles.lock().contains(&shuffle_id)
    }

    async fn unregister_shuffle_metadata(
        &self,
        shuffle_id: ShuffleId,
    ) -> Result<()> {
        self.handle(CleanupTask::Shuffle(shuffle_id), Call::UnregisterShuffle(shuffle_id))
            .await
    }
}

#[async_trait]
impl ShuffleStore for FakeCluster {
    async fn remove_shuffle_blocks(
        &self,
        shuffle_id: ShuffleId,
        blocking: bool,
    ) -> Result<()> {
        self.handle(
            CleanupTask::Shuffle(shuffle_id),
            Call::RemoveShuffleBlocks { shuffle_id, blocking },
        )
        .await
    }
}

#[async_trait]
impl BroadcastManager for FakeCluster {
    async fn remove_broadcast_replicas(
        &self,
        broadcast_id: BroadcastId,
        remove_origin: bool,
        blocking: bool,
    ) -> Result<()> {
        self.handle(
            CleanupTask::Broadcast(broadcast_id),
            Call::RemoveBroadcast {
                broadcast_id,
                remove_origin,
                blocking,
            },
        )
        .await
    }
}

#[async_trait]
impl AccumulatorRegistry for FakeCluster {
    async fn remove_accumulator_registration(
        &self,
        acc_id: AccumulatorId,
    ) -> Result<()> {
        self.handle(CleanupTask::Accumulator(acc_id), Call::RemoveAccumulator(acc_id))
            .await
    }
}

#[async_trait]
impl CheckpointStore for FakeCluster {
    async fn delete_checkpoint_artifacts(
        &self,
        rdd_id: RddId,
    ) -> Result<()> {
        self.handle(CleanupTask::Checkpoint(rdd_id), Call::DeleteCheckpoint(rdd_id))
            .await
    }
}
