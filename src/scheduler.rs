//! Background refresh of popular coins
//!
//! Every `refresh_interval_secs` the refresher refetches the allow-listed
//! coins that some client has already requested. The first sweep runs one
//! full period after spawn, since nothing is warm at startup.

use crate::cache::PriceHistoryCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Handle to the spawned sweep task
///
/// Dropping the handle does not stop the task.
pub struct ScheduledRefresher {
    handle: JoinHandle<()>,
}

impl ScheduledRefresher {
    /// Starts the background sweep on the current tokio runtime
    pub fn spawn(cache: Arc<PriceHistoryCache>) -> Self {
        let period = cache.config().refresh_interval().max(Duration::from_secs(1));

        let handle = tokio::spawn(async move {
            tracing::info!(
                refresh_interval_secs = period.as_secs(),
                popular_coins = ?cache.config().popular_coins,
                "Starting scheduled price history refresh"
            );

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let report = cache.sweep_popular().await;
                tracing::info!(
                    refreshed = report.refreshed.len(),
                    failed = report.failed.len(),
                    skipped_cold = report.skipped_cold.len(),
                    "Scheduled refresh complete"
                );
                if !report.failed.is_empty() {
                    tracing::warn!(coins = ?report.failed, "Scheduled refresh failures");
                }
            }
        });

        Self { handle }
    }

    /// Stops the sweep task
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
