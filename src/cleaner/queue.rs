//! Reclamation queue
//!
//! The channel through which unreachable registrations reach the dispatcher.
//!
//! ```text
//! Tracked<T> last clone dropped ──┐
//!                                 ├──> surface(id) ──> unbounded mpsc ──> Dispatcher
//! collect() reclamation pass ─────┘
//! ```
//!
//! Weakly registered objects are only discovered by a reclamation pass,
//! either forced by the periodic collector or requested explicitly.
//! `Tracked<T>` announces its own release, so it needs no pass at all.

use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use super::registry::HandleId;
use super::registry::TrackingRegistry;

#[derive(Debug, Clone)]
pub struct ReclamationQueue {
    registry: Arc<TrackingRegistry>,
    sender: mpsc::UnboundedSender<HandleId>,
}

impl ReclamationQueue {
    pub(crate) fn new(registry: Arc<TrackingRegistry>) -> (Self, mpsc::UnboundedReceiver<HandleId>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { registry, sender }, receiver)
    }

    /// Puts one pending handle on the queue. Never blocks.
    ///
    /// Returns false when the handle is unknown, was already surfaced, or the
    /// consumer side is gone.
    pub(crate) fn surface(
        &self,
        id: HandleId,
    ) -> bool {
        if !self.registry.claim(id) {
            return false;
        }
        self.send(id)
    }

    /// Runs one reclamation pass: every weakly tracked handle whose object has
    /// no strong owner left is put on the queue.
    ///
    /// Returns the number of handles surfaced by this pass.
    pub fn collect(&self) -> usize {
        let unreachable = self.registry.claim_unreachable();
        let surfaced = unreachable.into_iter().filter(|id| self.send(*id)).count();
        trace!(surfaced, "Reclamation pass finished");
        surfaced
    }

    fn send(
        &self,
        id: HandleId,
    ) -> bool {
        match self.sender.send(id) {
            Ok(()) => {
                trace!(handle_id = id, "Handle surfaced on reclamation queue");
                true
            }
            Err(_) => {
                trace!(handle_id = id, "Reclamation queue closed, handle dropped");
                false
            }
        }
    }
}

/// Surfaces its handle when dropped
struct ReleaseNotifier {
    id: HandleId,
    queue: ReclamationQueue,
}

impl Drop for ReleaseNotifier {
    fn drop(&mut self) {
        self.queue.surface(self.id);
    }
}

struct TrackedInner<T> {
    value: T,
    _notifier: Option<ReleaseNotifier>,
}

/// Shared-ownership handle over a resource proxy.
///
/// Clones share the same registration. Dropping the last clone surfaces the
/// registration on the reclamation queue immediately.
pub struct Tracked<T> {
    inner: Arc<TrackedInner<T>>,
}

impl<T> Tracked<T> {
    pub(crate) fn new(
        value: T,
        id: HandleId,
        queue: ReclamationQueue,
    ) -> Self {
        Self {
            inner: Arc::new(TrackedInner {
                value,
                _notifier: Some(ReleaseNotifier { id, queue }),
            }),
        }
    }

    /// Wraps a value that is not tracked (reference tracking disabled)
    pub(crate) fn untracked(value: T) -> Self {
        Self {
            inner: Arc::new(TrackedInner { value, _notifier: None }),
        }
    }

    /// Number of live clones sharing this registration
    pub fn owner_count(this: &Self) -> usize {
        Arc::strong_count(&this.inner)
    }
}

impl<T> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.value
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Tracked<T> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_tuple("Tracked").field(&self.inner.value).finish()
    }
}
