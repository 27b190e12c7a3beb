//! Background cache warm and periodic refresh.

use crate::cache::InterfaceCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Keeps every device's interface list warm.
pub struct SyncService {
    cache: Arc<InterfaceCache>,
    devices: Vec<String>,
    interval: Duration,
}

impl SyncService {
    pub fn new(cache: Arc<InterfaceCache>, devices: Vec<String>, interval: Duration) -> Self {
        Self {
            cache,
            devices,
            interval,
        }
    }

    /// Refreshes every device once, concurrently. Returns how many came back complete.
    pub async fn warm(&self) -> usize {
        let tasks: Vec<_> = self
            .devices
            .iter()
            .map(|device| {
                let cache = Arc::clone(&self.cache);
                let device = device.clone();
                tokio::spawn(async move { refresh_once(&cache, &device).await })
            })
            .collect();

        let mut complete = 0;
        for task in tasks {
            match task.await {
                Ok(true) => complete += 1,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Warm task failed"),
            }
        }
        info!(devices = self.devices.len(), complete, "Cache warm finished");
        complete
    }

    /// Starts one refresh loop per device. Loops exit when `token` is cancelled.
    pub fn spawn(&self, token: CancellationToken) -> Vec<JoinHandle<()>> {
        self.devices
            .iter()
            .map(|device| {
                let cache = Arc::clone(&self.cache);
                let device = device.clone();
                let token = token.clone();
                let period = self.interval;
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    // the first tick fires immediately; warm covers it
                    ticker.tick().await;
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => {
                                debug!(device = %device, "Refresh loop stopped");
                                break;
                            }
                            _ = ticker.tick() => {
                                refresh_once(&cache, &device).await;
                            }
                        }
                    }
                })
            })
            .collect()
    }
}

async fn refresh_once(cache: &InterfaceCache, device: &str) -> bool {
    match cache.refresh(device).await {
        Ok(refreshed) if refreshed.is_degraded() => {
            warn!(device, warnings = ?refreshed.warnings, "Refresh degraded");
            false
        }
        Ok(refreshed) => {
            debug!(device, interfaces = refreshed.value.len(), "Refreshed");
            true
        }
        Err(e) => {
            warn!(device, error = %e, "Refresh failed");
            false
        }
    }
}
