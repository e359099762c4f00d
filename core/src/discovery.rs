//! # Discovery & Enrichment Feed
//!
//! Sweeps a set of candidate addresses for live devices and feeds the registry.
//!
//! Each sweep:
//! 1. **Discovery**: probes every candidate through a bounded worker pool and
//!    `add`s the ones that answer.
//! 2. **Enrichment**: when an [`Enricher`] is configured, queries each responsive
//!    device (same worker bound) and reports the SNMP result to the registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use watchr_common::network::address::DeviceAddress;
use watchr_common::network::device::Protocol;

use crate::ports::{Enricher, Prober};
use crate::registry::DeviceRegistry;
use crate::suspension::Outcome;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub responsive: Vec<DeviceAddress>,
    pub added: usize,
    pub enriched: usize,
}

pub struct DiscoveryFeed {
    registry: Arc<DeviceRegistry>,
    prober: Arc<dyn Prober>,
    enricher: Option<Arc<dyn Enricher>>,
    workers: Arc<Semaphore>,
}

impl DiscoveryFeed {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        prober: Arc<dyn Prober>,
        enricher: Option<Arc<dyn Enricher>>,
        workers: usize,
    ) -> Self {
        Self {
            registry,
            prober,
            enricher,
            workers: Arc::new(Semaphore::new(workers)),
        }
    }

    pub async fn sweep(&self, candidates: &[DeviceAddress]) -> SweepReport {
        let mut report = SweepReport {
            probed: candidates.len(),
            ..SweepReport::default()
        };

        let mut probes: JoinSet<Option<DeviceAddress>> = JoinSet::new();
        for address in candidates.iter().cloned() {
            let prober: Arc<dyn Prober> = Arc::clone(&self.prober);
            let workers: Arc<Semaphore> = Arc::clone(&self.workers);
            probes.spawn(async move {
                let _permit = workers.acquire_owned().await.ok()?;
                match prober.probe(&address).await {
                    Ok(probe) if probe.is_success() => Some(address),
                    Ok(_) => None,
                    Err(e) => {
                        debug!("Discovery probe of {address} failed: {e:#}");
                        None
                    }
                }
            });
        }

        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(Some(address)) => report.responsive.push(address),
                Ok(None) => {}
                Err(e) => error!("Discovery probe task failed: {e}"),
            }
        }
        report.responsive.sort();

        report.added = report
            .responsive
            .iter()
            .filter(|address| self.registry.add(address))
            .count();

        if let Some(enricher) = &self.enricher {
            report.enriched = self.enrich(enricher, &report.responsive).await;
        }

        info!(
            "Discovery sweep: {} probed, {} responsive, {} new",
            report.probed,
            report.responsive.len(),
            report.added
        );
        report
    }

    async fn enrich(&self, enricher: &Arc<dyn Enricher>, addresses: &[DeviceAddress]) -> usize {
        let mut queries: JoinSet<bool> = JoinSet::new();

        for address in addresses.iter().cloned() {
            let enricher: Arc<dyn Enricher> = Arc::clone(enricher);
            let registry: Arc<DeviceRegistry> = Arc::clone(&self.registry);
            let workers: Arc<Semaphore> = Arc::clone(&self.workers);
            queries.spawn(async move {
                let Ok(_permit) = workers.acquire_owned().await else {
                    return false;
                };
                match enricher.enrich(&address).await {
                    Ok(fields) => {
                        registry.update(&address, Outcome::Enrichment(fields));
                        registry.update(&address, Outcome::ProbeSuccess(Protocol::Snmp));
                        true
                    }
                    Err(e) => {
                        debug!("Enrichment of {address} failed: {e:#}");
                        registry.update(&address, Outcome::ProbeFailure(Protocol::Snmp));
                        false
                    }
                }
            });
        }

        let mut enriched: usize = 0;
        while let Some(joined) = queries.join_next().await {
            match joined {
                Ok(true) => enriched += 1,
                Ok(false) => {}
                Err(e) => error!("Enrichment task failed: {e}"),
            }
        }
        enriched
    }

    /// Sweeps `candidates` every `interval` until shutdown.
    pub async fn run(
        self,
        candidates: Vec<DeviceAddress>,
        interval: Duration,
        shutdown: CancellationToken,
    ) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.sweep(&candidates) => {}
            }
        }

        debug!("Discovery loop stopped");
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
