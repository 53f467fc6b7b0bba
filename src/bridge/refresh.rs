//! Periodic re-discovery of the server's tools.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ToolBridge;

const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Refresh `bridge` every `interval` until `cancel` fires.
///
/// The first refresh happens one interval after spawning. Failures are logged
/// and the loop keeps going.
pub fn spawn_refresher(
    bridge: Arc<ToolBridge>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let interval = interval.max(MIN_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        info!(interval_secs = interval.as_secs_f64(), "tool refresher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("tool refresher stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match bridge.refresh_tools().await {
                        Ok(count) => debug!(tools = count, "periodic tool refresh"),
                        Err(e) => warn!(error = %e, "periodic tool refresh failed"),
                    }
                }
            }
        }
    })
}
