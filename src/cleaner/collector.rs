use std::time::Duration;

use tokio::time::interval_at;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::queue::ReclamationQueue;
use crate::metrics::CLEANER_FORCED_COLLECTIONS;
use crate::Result;

/// Forces a reclamation pass every `interval`.
///
/// Weakly tracked objects are only noticed by a pass, so in a quiet process
/// this bounds how long their cluster-side resources outlive them. Whatever a
/// pass finds goes through the normal dispatcher path.
pub(crate) struct PeriodicCollector {
    queue: ReclamationQueue,
    interval: Duration,
    cancel: CancellationToken,
}

impl PeriodicCollector {
    pub(crate) fn new(
        queue: ReclamationQueue,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self { queue, interval, cancel }
    }

    pub(crate) async fn run(self) -> Result<()> {
        // First pass one full interval after start
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    CLEANER_FORCED_COLLECTIONS.inc();
                    let surfaced = self.queue.collect();
                    debug!(surfaced, "Forced reclamation pass");
                }
            }
        }

        debug!("Periodic collector stopped");
        Ok(())
    }
}
