//! Periodic sync trigger.
//!
//! Thin adapter between the host application's background-task runner and
//! the bulk sync operation. Holds no state of its own.

use std::time::Duration;

use tracing::debug;

use crate::sync::{RetakeSyncService, SYNC_RETRY_INTERVAL};

/// Periodically syncs every lesson with pending offline data.
#[derive(Clone)]
pub struct SyncCron {
    sync: RetakeSyncService,
    interval: Duration,
}

impl SyncCron {
    #[must_use]
    pub fn new(sync: RetakeSyncService) -> Self {
        Self {
            sync,
            interval: SYNC_RETRY_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One scheduler firing: sync whatever needs it.
    ///
    /// Per-lesson failures are already isolated by the bulk operation;
    /// a failed scan is logged and retried on the next firing.
    pub async fn tick(&self) {
        match self.sync.sync_all_lessons(false).await {
            Ok(outcomes) => {
                let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
                debug!(synced = outcomes.len() - failed, failed, "periodic lesson sync finished");
            }
            Err(e) => debug!(error = %e, "periodic lesson sync could not scan pending lessons"),
        }
    }

    /// Run forever at the configured interval.
    pub async fn run(&self) {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            self.tick().await;
        }
    }
}
