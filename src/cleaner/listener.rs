use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use tracing::error;

use crate::metrics::CLEANER_LISTENER_FAULTS;
use crate::AccumulatorId;
use crate::BroadcastId;
use crate::CleanupTask;
use crate::RddId;
use crate::ShuffleId;

/// Observer of completed cleanups.
///
/// Each callback fires once per cleanup that finished without error, after
/// the collaborator call returned. Callbacks run on the dispatcher (or on the
/// caller of a direct cleanup) and should return quickly.
#[cfg_attr(test, automock)]
pub trait CleanerListener: Send + Sync + 'static {
    fn rdd_cleaned(
        &self,
        rdd_id: RddId,
    );

    fn shuffle_cleaned(
        &self,
        shuffle_id: ShuffleId,
    );

    fn broadcast_cleaned(
        &self,
        broadcast_id: BroadcastId,
    );

    fn accum_cleaned(
        &self,
        acc_id: AccumulatorId,
    );

    fn checkpoint_cleaned(
        &self,
        rdd_id: RddId,
    );
}

/// Attached listeners. Attaching is allowed while notifications are in flight.
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: RwLock<Vec<Arc<dyn CleanerListener>>>,
}

impl ListenerSet {
    pub(crate) fn attach(
        &self,
        listener: Arc<dyn CleanerListener>,
    ) {
        self.listeners.write().push(listener);
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Notifies every listener of a completed cleanup.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// are still notified.
    pub(crate) fn notify(
        &self,
        task: CleanupTask,
    ) {
        // Snapshot so a listener may attach another listener without deadlocking
        let listeners: Vec<Arc<dyn CleanerListener>> = self.listeners.read().clone();

        for listener in listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| match task {
                CleanupTask::Rdd(id) => listener.rdd_cleaned(id),
                CleanupTask::Shuffle(id) => listener.shuffle_cleaned(id),
                CleanupTask::Broadcast(id) => listener.broadcast_cleaned(id),
                CleanupTask::Accumulator(id) => listener.accum_cleaned(id),
                CleanupTask::Checkpoint(id) => listener.checkpoint_cleaned(id),
            }));

            if outcome.is_err() {
                CLEANER_LISTENER_FAULTS.with_label_values(&[&task.kind().to_string()]).inc();
                error!(kind = %task.kind(), id = task.id(), "Cleaner listener panicked");
            }
        }
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ListenerSet").field("listeners", &self.len()).finish()
    }
}
