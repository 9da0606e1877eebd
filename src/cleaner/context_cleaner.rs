use std::any::Any;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::trace;

use super::collector::PeriodicCollector;
use super::dispatcher::Dispatcher;
use super::handlers::CleanupHandlers;
use super::listener::ListenerSet;
use super::queue::ReclamationQueue;
use super::queue::Tracked;
use super::registry::HandleId;
use super::registry::TrackingRegistry;
use crate::metrics::register_cleaner_metrics;
use crate::utils::async_task::spawn_task;
use crate::AccumulatorId;
use crate::BroadcastId;
use crate::CleanerConfig;
use crate::CleanerListener;
use crate::CleanupError;
use crate::CleanupTask;
use crate::Collaborators;
use crate::Error;
use crate::Policy;
use crate::RddId;
use crate::ResourceKind;
use crate::Result;
use crate::ShuffleId;
use crate::SystemError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Running,
    /// Terminal, no restart
    Stopped,
}

struct BackgroundTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

struct Lifecycle {
    state: LifecycleState,
    /// Consumed by the dispatcher on start
    receiver: Option<mpsc::UnboundedReceiver<HandleId>>,
    dispatcher: Option<BackgroundTask>,
    collector: Option<BackgroundTask>,
}

/// Reclaims cluster-wide resources once the in-process objects standing for
/// them become unreachable.
///
/// Producers register objects from any thread. Once an object is gone its
/// registration travels through the reclamation queue to a single dispatcher
/// task, which calls the owning subsystem and notifies listeners. A second
/// task periodically forces a reclamation pass.
///
/// # Example
///
/// ```ignore
/// let cleaner = ContextCleaner::new(CleanerConfig::new()?.validate()?, collaborators);
/// cleaner.start()?;
///
/// let rdd = Arc::new(rdd_proxy);
/// cleaner.register_rdd_for_cleanup(&rdd, 7);
/// drop(rdd);
///
/// cleaner.force_collect(); // evicts rdd 7 on the dispatcher
/// cleaner.stop().await;
/// ```
pub struct ContextCleaner {
    config: CleanerConfig,
    registry: Arc<TrackingRegistry>,
    queue: ReclamationQueue,
    listeners: Arc<ListenerSet>,
    handlers: Arc<CleanupHandlers>,
    policy: Policy,

    lifecycle: Mutex<Lifecycle>,
    /// Flips to true once a stop has joined both background tasks
    shutdown: watch::Sender<bool>,
    stopped: Arc<AtomicBool>,
    /// Shared by the dispatcher's critical section and the stop path
    dispatch_lock: Arc<tokio::sync::Mutex<()>>,
}

impl ContextCleaner {
    pub fn new(
        config: CleanerConfig,
        collaborators: Collaborators,
    ) -> Self {
        register_cleaner_metrics();

        let registry = Arc::new(TrackingRegistry::new());
        let (queue, receiver) = ReclamationQueue::new(registry.clone());
        let listeners = Arc::new(ListenerSet::default());
        let policy = config.policy();
        let handlers = Arc::new(CleanupHandlers::new(collaborators, listeners.clone(), policy));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            registry,
            queue,
            listeners,
            handlers,
            policy,
            lifecycle: Mutex::new(Lifecycle {
                state: LifecycleState::NotStarted,
                receiver: Some(receiver),
                dispatcher: None,
                collector: None,
            }),
            shutdown,
            stopped: Arc::new(AtomicBool::new(false)),
            dispatch_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Spawns the dispatcher and the periodic collector.
    ///
    /// Calling `start()` while running is a no-op; after `stop()` it fails
    /// with [`CleanupError::AlreadyStopped`]. Outside a tokio runtime it fails
    /// with [`CleanupError::NoRuntime`] and the cleaner stays not started.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match lifecycle.state {
            LifecycleState::Running => return Ok(()),
            LifecycleState::Stopped => return Err(CleanupError::AlreadyStopped.into()),
            LifecycleState::NotStarted => {}
        }

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(CleanupError::NoRuntime.into());
        }

        let Some(receiver) = lifecycle.receiver.take() else {
            return Err(Error::Fatal("reclamation queue receiver already taken".to_string()));
        };

        let dispatcher_cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            self.registry.clone(),
            self.handlers.clone(),
            receiver,
            self.dispatch_lock.clone(),
            self.stopped.clone(),
            dispatcher_cancel.clone(),
            self.config.dispatcher.poll_timeout(),
        );
        lifecycle.dispatcher = Some(BackgroundTask {
            handle: spawn_task("cleaner-dispatcher", move || dispatcher.run()),
            cancel: dispatcher_cancel,
        });

        let collector_cancel = CancellationToken::new();
        let collector = PeriodicCollector::new(
            self.queue.clone(),
            self.policy.force_collect_interval,
            collector_cancel.clone(),
        );
        lifecycle.collector = Some(BackgroundTask {
            handle: spawn_task("cleaner-periodic-gc", move || collector.run()),
            cancel: collector_cancel,
        });

        lifecycle.state = LifecycleState::Running;
        info!(
            periodic_gc_interval = ?self.policy.force_collect_interval,
            "Context cleaner started"
        );
        Ok(())
    }

    /// Stops both background tasks. Terminal.
    ///
    /// If a cleanup is in progress, returns only after it has completed and
    /// the dispatcher has exited. This holds for every caller: a stop racing
    /// with another one waits until the first has joined both tasks. Handles
    /// surfaced after this point are never dispatched.
    pub async fn stop(&self) {
        let tasks = {
            let mut lifecycle = self.lifecycle.lock();
            let was = lifecycle.state;
            lifecycle.state = LifecycleState::Stopped;
            self.stopped.store(true, Ordering::Release);

            match was {
                LifecycleState::Stopped => None,
                LifecycleState::NotStarted => {
                    lifecycle.receiver.take();
                    self.shutdown.send_replace(true);
                    info!("Context cleaner stopped before it was started");
                    return;
                }
                LifecycleState::Running => Some((lifecycle.dispatcher.take(), lifecycle.collector.take())),
            }
        };

        let Some((dispatcher, collector)) = tasks else {
            // Another caller owns the shutdown; wait until it has joined both tasks
            let mut joined = self.shutdown.subscribe();
            let _ = joined.wait_for(|done| *done).await;
            return;
        };

        if let Some(dispatcher) = dispatcher {
            {
                // Waits for an in-flight cleanup to finish before cancelling
                let _guard = self.dispatch_lock.lock().await;
                dispatcher.cancel.cancel();
            }
            if let Err(e) = dispatcher.handle.await {
                error!(error = %Error::from(SystemError::TaskFailed(e)), "Cleaner dispatcher exited abnormally");
            }
        }

        if let Some(collector) = collector {
            collector.cancel.cancel();
            if let Err(e) = collector.handle.await {
                error!(error = %Error::from(SystemError::TaskFailed(e)), "Periodic collector exited abnormally");
            }
        }

        self.shutdown.send_replace(true);
        info!("Context cleaner stopped");
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.lock().state
    }

    //-----------------------------------------------------------
    // Registration

    /// Tracks `watched` and runs `task` once it is no longer strongly
    /// referenced anywhere. Does not extend the lifetime of `watched`; the
    /// release is noticed by the next reclamation pass.
    pub fn register_for_cleanup<W>(
        &self,
        watched: &Arc<W>,
        task: CleanupTask,
    ) where
        W: Send + Sync + 'static,
    {
        if !self.is_tracking(task.kind()) {
            trace!(%task, "Reference tracking disabled, not registering");
            return;
        }
        let weak: Weak<dyn Any + Send + Sync> = Arc::downgrade(watched) as Weak<dyn Any + Send + Sync>;
        self.registry.register_weak(weak, task);
    }

    pub fn register_rdd_for_cleanup<W: Send + Sync + 'static>(
        &self,
        rdd: &Arc<W>,
        rdd_id: RddId,
    ) {
        self.register_for_cleanup(rdd, CleanupTask::Rdd(rdd_id));
    }

    pub fn register_shuffle_for_cleanup<W: Send + Sync + 'static>(
        &self,
        shuffle_dependency: &Arc<W>,
        shuffle_id: ShuffleId,
    ) {
        self.register_for_cleanup(shuffle_dependency, CleanupTask::Shuffle(shuffle_id));
    }

    pub fn register_broadcast_for_cleanup<W: Send + Sync + 'static>(
        &self,
        broadcast: &Arc<W>,
        broadcast_id: BroadcastId,
    ) {
        self.register_for_cleanup(broadcast, CleanupTask::Broadcast(broadcast_id));
    }

    pub fn register_accumulator_for_cleanup<W: Send + Sync + 'static>(
        &self,
        accumulator: &Arc<W>,
        acc_id: AccumulatorId,
    ) {
        self.register_for_cleanup(accumulator, CleanupTask::Accumulator(acc_id));
    }

    /// Only tracked when `clean_checkpoints` is enabled
    pub fn register_checkpoint_for_cleanup<W: Send + Sync + 'static>(
        &self,
        checkpoint_data: &Arc<W>,
        parent_id: RddId,
    ) {
        self.register_for_cleanup(checkpoint_data, CleanupTask::Checkpoint(parent_id));
    }

    /// Wraps `value` in a shared handle whose last release queues `task`
    /// right away, without waiting for a reclamation pass.
    pub fn track<T>(
        &self,
        value: T,
        task: CleanupTask,
    ) -> Tracked<T> {
        if !self.is_tracking(task.kind()) {
            trace!(%task, "Reference tracking disabled, not registering");
            return Tracked::untracked(value);
        }
        let id = self.registry.register_owned(task);
        Tracked::new(value, id, self.queue.clone())
    }

    fn is_tracking(
        &self,
        kind: ResourceKind,
    ) -> bool {
        if !self.config.reference_tracking || self.stopped.load(Ordering::Acquire) {
            return false;
        }
        kind != ResourceKind::Checkpoint || self.config.clean_checkpoints
    }

    /// Runs a reclamation pass now. Returns how many handles it surfaced.
    pub fn force_collect(&self) -> usize {
        self.queue.collect()
    }

    /// Registrations not yet dispatched
    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    //-----------------------------------------------------------
    // Observers

    pub fn attach_listener(
        &self,
        listener: Arc<dyn CleanerListener>,
    ) {
        self.listeners.attach(listener);
    }

    //-----------------------------------------------------------
    // Direct invocation
    //
    // Same collaborator calls and listener notification as the automatic
    // path, run on the caller's task. The pending set is not consulted.

    pub async fn cleanup_rdd(
        &self,
        rdd_id: RddId,
        blocking: bool,
    ) -> Result<()> {
        self.handlers.cleanup_rdd(rdd_id, blocking).await
    }

    pub async fn cleanup_shuffle(
        &self,
        shuffle_id: ShuffleId,
        blocking: bool,
    ) -> Result<()> {
        self.handlers.cleanup_shuffle(shuffle_id, blocking).await
    }

    pub async fn cleanup_broadcast(
        &self,
        broadcast_id: BroadcastId,
        blocking: bool,
    ) -> Result<()> {
        self.handlers.cleanup_broadcast(broadcast_id, blocking).await
    }

    pub async fn cleanup_accumulator(
        &self,
        acc_id: AccumulatorId,
        blocking: bool,
    ) -> Result<()> {
        self.handlers.cleanup_accumulator(acc_id, blocking).await
    }

    pub async fn cleanup_checkpoint(
        &self,
        rdd_id: RddId,
    ) -> Result<()> {
        self.handlers.cleanup_checkpoint(rdd_id).await
    }

    /// Direct cleanup of any task; `blocking = None` uses the configured policy
    pub async fn cleanup(
        &self,
        task: CleanupTask,
        blocking: Option<bool>,
    ) -> Result<()> {
        let blocking = blocking.unwrap_or_else(|| self.handlers.blocking_for(task.kind()));
        match task {
            CleanupTask::Rdd(id) => self.cleanup_rdd(id, blocking).await,
            CleanupTask::Shuffle(id) => self.cleanup_shuffle(id, blocking).await,
            CleanupTask::Broadcast(id) => self.cleanup_broadcast(id, blocking).await,
            CleanupTask::Accumulator(id) => self.cleanup_accumulator(id, blocking).await,
            CleanupTask::Checkpoint(id) => self.cleanup_checkpoint(id).await,
        }
    }
}

impl Drop for ContextCleaner {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle.get_mut();
        if lifecycle.state != LifecycleState::Running {
            return;
        }
        // Best effort: the tasks observe cancellation at their next poll
        self.stopped.store(true, Ordering::Release);
        for task in [lifecycle.dispatcher.take(), lifecycle.collector.take()].into_iter().flatten() {
            task.cancel.cancel();
        }
        lifecycle.state = LifecycleState::Stopped;
        trace!("Context cleaner dropped without stop()");
    }
}

impl std::fmt::Debug for ContextCleaner {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ContextCleaner")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("pending", &self.registry.len())
            .finish_non_exhaustive()
    }
}
