//! # Pruning
//!
//! Periodically evicts devices that have not been seen within the retention
//! window, and acknowledges suspensions that ran out on devices nobody touched.
//! Removal goes through the registry's normal removal path, so a pruned device
//! that was suspended releases its counter slot; its monitor is stopped by the
//! next reconciliation tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use watchr_common::network::address::DeviceAddress;

use crate::registry::DeviceRegistry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: Vec<DeviceAddress>,
    pub expired_suspensions: usize,
}

pub struct Pruner {
    registry: Arc<DeviceRegistry>,
    retention: Duration,
}

impl Pruner {
    pub fn new(registry: Arc<DeviceRegistry>, retention: Duration) -> Self {
        Self {
            registry,
            retention,
        }
    }

    pub fn tick(&self) -> PruneReport {
        let expired_suspensions: usize = self.registry.sweep_expired();

        let Some(cutoff) = Instant::now().checked_sub(self.retention) else {
            return PruneReport {
                removed: Vec::new(),
                expired_suspensions,
            };
        };

        let removed: Vec<DeviceAddress> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|device| device.last_seen < cutoff)
            .map(|device| device.address)
            .filter(|address| self.registry.remove_unseen_since(address, cutoff))
            .collect();

        if !removed.is_empty() {
            info!("Pruned {} devices unseen for {:?}", removed.len(), self.retention);
        }

        PruneReport {
            removed,
            expired_suspensions,
        }
    }

    pub async fn run(self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.tick();
        }

        debug!("Pruning loop stopped");
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
