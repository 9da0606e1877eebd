//! Tracking registry
//!
//! Keeps every registration that has not been dispatched yet (the pending
//! set). Producers insert from arbitrary threads; only the dispatcher removes.

use std::any::Any;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Weak;

use dashmap::DashMap;
use tracing::trace;

use crate::CleanupTask;

/// Identity of one registration call
pub(crate) type HandleId = u64;

/// How the registry learns that a watched object went away
enum Referent {
    /// Discovered by a reclamation pass once no strong owner is left
    Weak(Weak<dyn Any + Send + Sync>),
    /// Announced by the owning `Tracked<T>` when its last clone is dropped
    Owned,
}

/// One registration: a cleanup task bound to a non-owning view of the watched object.
pub(crate) struct TrackedHandle {
    id: HandleId,
    task: CleanupTask,
    referent: Referent,
    surfaced: AtomicBool,
}

impl TrackedHandle {
    pub(crate) fn id(&self) -> HandleId {
        self.id
    }

    pub(crate) fn task(&self) -> CleanupTask {
        self.task
    }

    /// True when a reclamation pass can prove the watched object is gone
    fn is_collectable(&self) -> bool {
        match &self.referent {
            Referent::Weak(weak) => weak.strong_count() == 0,
            Referent::Owned => false,
        }
    }

    /// Claims the right to put this handle on the queue. Succeeds once.
    pub(crate) fn try_mark_surfaced(&self) -> bool {
        !self.surfaced.swap(true, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for TrackedHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("TrackedHandle")
            .field("id", &self.id)
            .field("task", &self.task)
            .field("surfaced", &self.surfaced.load(Ordering::Relaxed))
            .finish()
    }
}

#[derive(Debug)]
pub(crate) struct TrackingRegistry {
    pending: DashMap<HandleId, TrackedHandle>,
    next_id: AtomicU64,
}

impl TrackingRegistry {
    pub(crate) fn new() -> Self {
        Self {
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Tracks `watched` without extending its lifetime
    pub(crate) fn register_weak(
        &self,
        watched: Weak<dyn Any + Send + Sync>,
        task: CleanupTask,
    ) -> HandleId {
        self.insert(Referent::Weak(watched), task)
    }

    /// Tracks an object whose owner reports its own release
    pub(crate) fn register_owned(
        &self,
        task: CleanupTask,
    ) -> HandleId {
        self.insert(Referent::Owned, task)
    }

    fn insert(
        &self,
        referent: Referent,
        task: CleanupTask,
    ) -> HandleId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pending.insert(
            id,
            TrackedHandle {
                id,
                task,
                referent,
                surfaced: AtomicBool::new(false),
            },
        );
        trace!(handle_id = id, %task, "Registered for cleanup");
        id
    }

    /// Claims a single handle for the queue, if it is still pending and not yet claimed
    pub(crate) fn claim(
        &self,
        id: HandleId,
    ) -> bool {
        self.pending
            .get(&id)
            .map(|handle| handle.try_mark_surfaced())
            .unwrap_or(false)
    }

    /// Claims every pending handle whose watched object is no longer reachable
    pub(crate) fn claim_unreachable(&self) -> Vec<HandleId> {
        self.pending
            .iter()
            .filter(|entry| entry.is_collectable() && entry.try_mark_surfaced())
            .map(|entry| entry.id())
            .collect()
    }

    /// Removes a handle for dispatch. Only the dispatcher calls this.
    pub(crate) fn remove(
        &self,
        id: HandleId,
    ) -> Option<TrackedHandle> {
        self.pending.remove(&id).map(|(_, handle)| handle)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
