use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use super::handlers::CleanupHandlers;
use super::registry::HandleId;
use super::registry::TrackingRegistry;
use crate::Result;

/// Single consumer of the reclamation queue.
///
/// Handles are dispatched one at a time in the order the queue surfaced them.
/// Dequeue, removal from the pending set and the handler call all happen under
/// `dispatch_lock`, the same lock the stop path holds while it cancels this
/// task, so a stop request never lands in the middle of a cleanup.
pub(crate) struct Dispatcher {
    registry: Arc<TrackingRegistry>,
    handlers: Arc<CleanupHandlers>,
    receiver: mpsc::UnboundedReceiver<HandleId>,
    dispatch_lock: Arc<Mutex<()>>,
    stopped: Arc<AtomicBool>,
    cancel: CancellationToken,
    poll_timeout: Duration,
}

impl Dispatcher {
    pub(crate) fn new(
        registry: Arc<TrackingRegistry>,
        handlers: Arc<CleanupHandlers>,
        receiver: mpsc::UnboundedReceiver<HandleId>,
        dispatch_lock: Arc<Mutex<()>>,
        stopped: Arc<AtomicBool>,
        cancel: CancellationToken,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            handlers,
            receiver,
            dispatch_lock,
            stopped,
            cancel,
            poll_timeout,
        }
    }

    pub(crate) async fn run(mut self) -> Result<()> {
        debug!("Cleaner dispatcher started");

        while !self.stopped.load(Ordering::Acquire) {
            let polled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Cleaner dispatcher cancelled while idle");
                    break;
                }
                polled = timeout(self.poll_timeout, self.receiver.recv()) => polled,
            };

            match polled {
                Ok(Some(id)) => self.dispatch(id).await,
                Ok(None) => {
                    debug!("Reclamation queue closed");
                    break;
                }
                // Idle: go round and observe the stop flag
                Err(_) => continue,
            }
        }

        debug!("Cleaner dispatcher stopped");
        Ok(())
    }

    async fn dispatch(
        &self,
        id: HandleId,
    ) {
        let _guard = self.dispatch_lock.lock().await;

        if self.stopped.load(Ordering::Acquire) {
            trace!(handle_id = id, "Cleaner stopped, handle not dispatched");
            return;
        }

        let Some(handle) = self.registry.remove(id) else {
            trace!(handle_id = id, "Handle already dispatched");
            return;
        };

        self.handlers.dispatch(handle.task()).await;
    }
}
