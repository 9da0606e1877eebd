use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use d_cleaner::AccumulatorId;
use d_cleaner::AccumulatorRegistry;
use d_cleaner::BroadcastId;
use d_cleaner::BroadcastManager;
use d_cleaner::CacheCoordinator;
use d_cleaner::CheckpointStore;
use d_cleaner::CleanerConfig;
use d_cleaner::CleanerListener;
use d_cleaner::CleanupTask;
use d_cleaner::Collaborators;
use d_cleaner::ContextCleaner;
use d_cleaner::Error;
use d_cleaner::RddId;
use d_cleaner::Result;
use d_cleaner::ShuffleId;
use d_cleaner::ShuffleStore;
use d_cleaner::ShuffleTracker;
use parking_lot::Mutex;
use tonic::async_trait;
use tracing_subscriber::EnvFilter;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

/// Collaborator event, in the order the cluster saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(CleanupTask),
    Finished(CleanupTask),
}

/// Cluster stand-in shared by every integration scenario
#[derive(Default)]
pub struct Cluster {
    events: Mutex<Vec<Event>>,
    failing: Mutex<HashSet<CleanupTask>>,
    slow: Mutex<Option<(CleanupTask, Duration)>>,
}

impl Cluster {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn started(
        &self,
        task: CleanupTask,
    ) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| **e == Event::Started(task))
            .count()
    }

    pub fn finished(
        &self,
        task: CleanupTask,
    ) -> bool {
        self.events.lock().contains(&Event::Finished(task))
    }

    pub fn fail(
        &self,
        task: CleanupTask,
    ) {
        self.failing.lock().insert(task);
    }

    pub fn slow_down(
        &self,
        task: CleanupTask,
        delay: Duration,
    ) {
        *self.slow.lock() = Some((task, delay));
    }

    async fn touch(
        &self,
        task: CleanupTask,
    ) -> Result<()> {
        self.events.lock().push(Event::Started(task));

        let delay = match *self.slow.lock() {
            Some((slow_task, delay)) if slow_task == task => Some(delay),
            _ => None,
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.events.lock().push(Event::Finished(task));
        if self.failing.lock().contains(&task) {
            return Err(Error::Fatal(format!("{task} could not be removed")));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheCoordinator for Cluster {
    async fn evict_cached(
        &self,
        rdd_id: RddId,
        _blocking: bool,
    ) -> Result<()> {
        self.touch(CleanupTask::Rdd(rdd_id)).await
    }
}

#[async_trait]
impl ShuffleTracker for Cluster {
    async fn unregister_shuffle_metadata(
        &self,
        _shuffle_id: ShuffleId,
    ) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl ShuffleStore for Cluster {
    async fn remove_shuffle_blocks(
        &self,
        shuffle_id: ShuffleId,
        _blocking: bool,
    ) -> Result<()> {
        self.touch(CleanupTask::Shuffle(shuffle_id)).await
    }
}

#[async_trait]
impl BroadcastManager for Cluster {
    async fn remove_broadcast_replicas(
        &self,
        broadcast_id: BroadcastId,
        _remove_origin: bool,
        _blocking: bool,
    ) -> Result<()> {
        self.touch(CleanupTask::Broadcast(broadcast_id)).await
    }
}

#[async_trait]
impl AccumulatorRegistry for Cluster {
    async fn remove_accumulator_registration(
        &self,
        acc_id: AccumulatorId,
    ) -> Result<()> {
        self.touch(CleanupTask::Accumulator(acc_id)).await
    }
}

#[async_trait]
impl CheckpointStore for Cluster {
    async fn delete_checkpoint_artifacts(
        &self,
        rdd_id: RddId,
    ) -> Result<()> {
        self.touch(CleanupTask::Checkpoint(rdd_id)).await
    }
}

#[derive(Default)]
pub struct Notifications {
    seen: Mutex<Vec<CleanupTask>>,
}

impl Notifications {
    pub fn seen(&self) -> Vec<CleanupTask> {
        self.seen.lock().clone()
    }

    pub fn count_of(
        &self,
        task: CleanupTask,
    ) -> usize {
        self.seen.lock().iter().filter(|t| **t == task).count()
    }
}

impl CleanerListener for Notifications {
    fn rdd_cleaned(
        &self,
        rdd_id: RddId,
    ) {
        self.seen.lock().push(CleanupTask::Rdd(rdd_id));
    }

    fn shuffle_cleaned(
        &self,
        shuffle_id: ShuffleId,
    ) {
        self.seen.lock().push(CleanupTask::Shuffle(shuffle_id));
    }

    fn broadcast_cleaned(
        &self,
        broadcast_id: BroadcastId,
    ) {
        self.seen.lock().push(CleanupTask::Broadcast(broadcast_id));
    }

    fn accum_cleaned(
        &self,
        acc_id: AccumulatorId,
    ) {
        self.seen.lock().push(CleanupTask::Accumulator(acc_id));
    }

    fn checkpoint_cleaned(
        &self,
        rdd_id: RddId,
    ) {
        self.seen.lock().push(CleanupTask::Checkpoint(rdd_id));
    }
}

pub fn collaborators(cluster: &Arc<Cluster>) -> Collaborators {
    Collaborators {
        cache: cluster.clone(),
        shuffle_tracker: cluster.clone(),
        shuffle_store: cluster.clone(),
        broadcasts: cluster.clone(),
        accumulators: cluster.clone(),
        checkpoints: cluster.clone(),
    }
}

pub fn quick_config() -> CleanerConfig {
    let mut config = CleanerConfig::default();
    config.dispatcher.poll_timeout_in_ms = 10;
    config
}

/// Started cleaner over a fresh cluster
pub fn start_cleaner(
    config: CleanerConfig
) -> (Arc<ContextCleaner>, Arc<Cluster>, Arc<Notifications>) {
    enable_logger();
    let cluster = Arc::new(Cluster::default());
    let notifications = Arc::new(Notifications::default());
    let cleaner = Arc::new(ContextCleaner::new(config, collaborators(&cluster)));
    cleaner.attach_listener(notifications.clone());
    cleaner.start().expect("cleaner should start");
    (cleaner, cluster, notifications)
}

pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
