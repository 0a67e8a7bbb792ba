use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::AppError;
use crate::gateway::Gateway;
use crate::services::loader::load_snapshot;
use crate::services::status_sync::{RefreshStats, StatusSyncController};

/// Periodic background reload of the planner snapshot.
pub struct RefreshScheduler {
    gateway: Arc<dyn Gateway>,
    sync: StatusSyncController,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(gateway: Arc<dyn Gateway>, sync: StatusSyncController, interval: Duration) -> Self {
        Self {
            gateway,
            sync,
            interval,
        }
    }

    /// Runs until the controller is shut down.
    pub async fn start(self) {
        info!("Starting refresh scheduler (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;
            if !self.sync.is_alive() {
                break;
            }

            match self.run_refresh().await {
                Ok(stats) => {
                    info!(
                        "Refresh completed - adopted: {}, kept optimistic: {}",
                        stats.adopted, stats.suppressed
                    );
                }
                Err(e) => {
                    // Keep the last good state and try again next tick.
                    warn!("Refresh failed: {}", e);
                }
            }
        }

        info!("Refresh scheduler stopped");
    }

    pub async fn run_refresh(&self) -> Result<RefreshStats, AppError> {
        let snapshot = load_snapshot(&self.gateway).await?;
        Ok(self.sync.apply_snapshot(snapshot))
    }
}
