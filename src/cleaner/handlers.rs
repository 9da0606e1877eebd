//! Per-kind cleanup handlers.
//!
//! | Kind        | Collaborator call(s)                                   | Blocking      |
//! |-------------|--------------------------------------------------------|---------------|
//! | Rdd         | `evict_cached`                                         | block_default |
//! | Shuffle     | `unregister_shuffle_metadata`, `remove_shuffle_blocks` | block_shuffle |
//! | Broadcast   | `remove_broadcast_replicas(remove_origin = true)`      | block_default |
//! | Accumulator | `remove_accumulator_registration`                      | block_default |
//! | Checkpoint  | `delete_checkpoint_artifacts`                          | always        |
//!
//! A failed call is logged and the task dropped: no retry, no requeue, no
//! listener notification.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::debug;
use tracing::error;

use super::listener::ListenerSet;
use crate::metrics::CLEANER_TASKS_CLEANED;
use crate::metrics::CLEANER_TASKS_FAILED;
use crate::AccumulatorId;
use crate::BroadcastId;
use crate::CleanupError;
use crate::CleanupTask;
use crate::Collaborators;
use crate::Policy;
use crate::RddId;
use crate::ResourceKind;
use crate::Result;
use crate::ShuffleId;

enum Outcome {
    Cleaned,
    /// Nothing left to clean; listeners are not told
    Skipped,
}

pub(crate) struct CleanupHandlers {
    collaborators: Collaborators,
    listeners: Arc<ListenerSet>,
    policy: Policy,
}

impl CleanupHandlers {
    pub(crate) fn new(
        collaborators: Collaborators,
        listeners: Arc<ListenerSet>,
        policy: Policy,
    ) -> Self {
        Self {
            collaborators,
            listeners,
            policy,
        }
    }

    /// Blocking flag the automatic path uses for `kind`
    pub(crate) fn blocking_for(
        &self,
        kind: ResourceKind,
    ) -> bool {
        match kind {
            ResourceKind::Shuffle => self.policy.block_shuffle,
            ResourceKind::Checkpoint => true,
            _ => self.policy.block_default,
        }
    }

    /// Routes a task surfaced by the queue to its handler using the policy's
    /// blocking flags. Failures are already logged by the handler.
    pub(crate) async fn dispatch(
        &self,
        task: CleanupTask,
    ) {
        let _ = self.run(task, self.blocking_for(task.kind())).await;
    }

    pub(crate) async fn cleanup_rdd(
        &self,
        rdd_id: RddId,
        blocking: bool,
    ) -> Result<()> {
        self.run(CleanupTask::Rdd(rdd_id), blocking).await
    }

    pub(crate) async fn cleanup_shuffle(
        &self,
        shuffle_id: ShuffleId,
        blocking: bool,
    ) -> Result<()> {
        self.run(CleanupTask::Shuffle(shuffle_id), blocking).await
    }

    pub(crate) async fn cleanup_broadcast(
        &self,
        broadcast_id: BroadcastId,
        blocking: bool,
    ) -> Result<()> {
        self.run(CleanupTask::Broadcast(broadcast_id), blocking).await
    }

    pub(crate) async fn cleanup_accumulator(
        &self,
        acc_id: AccumulatorId,
        blocking: bool,
    ) -> Result<()> {
        self.run(CleanupTask::Accumulator(acc_id), blocking).await
    }

    pub(crate) async fn cleanup_checkpoint(
        &self,
        rdd_id: RddId,
    ) -> Result<()> {
        self.run(CleanupTask::Checkpoint(rdd_id), true).await
    }

    /// Performs one cleanup and notifies listeners on success.
    ///
    /// Collaborator errors and panics stop here: they are logged, counted and
    /// returned, but never retried.
    async fn run(
        &self,
        task: CleanupTask,
        blocking: bool,
    ) -> Result<()> {
        let kind = task.kind();
        let id = task.id();
        debug!(%kind, id, blocking, "Cleaning");

        let outcome = match AssertUnwindSafe(self.perform(task, blocking)).catch_unwind().await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(CleanupError::Collaborator {
                kind,
                id,
                reason: e.to_string(),
            }),
            Err(_) => Err(CleanupError::Panicked { kind, id }),
        };

        match outcome {
            Ok(Outcome::Cleaned) => {
                CLEANER_TASKS_CLEANED.with_label_values(&[&kind.to_string()]).inc();
                self.listeners.notify(task);
                debug!(%kind, id, "Cleaned");
                Ok(())
            }
            Ok(Outcome::Skipped) => Ok(()),
            Err(e) => {
                CLEANER_TASKS_FAILED.with_label_values(&[&kind.to_string()]).inc();
                error!(%kind, id, error = %e, "Error cleaning {}", kind);
                Err(e.into())
            }
        }
    }

    async fn perform(
        &self,
        task: CleanupTask,
        blocking: bool,
    ) -> Result<Outcome> {
        let c = &self.collaborators;
        match task {
            CleanupTask::Rdd(rdd_id) => {
                c.cache.evict_cached(rdd_id, blocking).await?;
            }
            CleanupTask::Shuffle(shuffle_id) => {
                if !c.shuffle_tracker.contains_shuffle(shuffle_id).await {
                    debug!(
                        shuffle_id,
                        "Asked to clean up non-existent shuffle (maybe it was already removed)"
                    );
                    return Ok(Outcome::Skipped);
                }
                c.shuffle_tracker.unregister_shuffle_metadata(shuffle_id).await?;
                c.shuffle_store.remove_shuffle_blocks(shuffle_id, blocking).await?;
            }
            CleanupTask::Broadcast(broadcast_id) => {
                c.broadcasts.remove_broadcast_replicas(broadcast_id, true, blocking).await?;
            }
            CleanupTask::Accumulator(acc_id) => {
                c.accumulators.remove_accumulator_registration(acc_id).await?;
            }
            CleanupTask::Checkpoint(rdd_id) => {
                c.checkpoints.delete_checkpoint_artifacts(rdd_id).await?;
            }
        }
        Ok(Outcome::Cleaned)
    }
}

impl std::fmt::Debug for CleanupHandlers {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CleanupHandlers")
            .field("policy", &self.policy)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}
