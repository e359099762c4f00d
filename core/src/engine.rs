//! # Monitoring Engine
//!
//! Wires the registry, the discovery feed and the reconciliation and pruning
//! loops together under one shutdown token.
//!
//! [`Engine::shutdown`] returns only after every loop and every monitor task has
//! exited, so no probe outcome is lost when the process stops.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use watchr_common::config::{Config, ConfigError};
use watchr_common::network::address::DeviceAddress;

use crate::discovery::DiscoveryFeed;
use crate::monitor::MonitorSettings;
use crate::ports::{Enricher, MetricsSink, Prober};
use crate::prune::Pruner;
use crate::reconcile::Reconciler;
use crate::registry::{DeviceRegistry, Health};

/// External collaborators the engine drives.
pub struct Collaborators {
    pub prober: Arc<dyn Prober>,
    pub sink: Arc<dyn MetricsSink>,
    pub enricher: Option<Arc<dyn Enricher>>,
}

pub struct Engine {
    registry: Arc<DeviceRegistry>,
    reconciler: Arc<Reconciler>,
    shutdown: CancellationToken,
    loops: Vec<(&'static str, JoinHandle<()>)>,
}

impl Engine {
    /// Validates `cfg` and spawns the discovery, reconciliation and pruning loops.
    ///
    /// `candidates` are the addresses the discovery feed sweeps.
    pub fn start(
        cfg: &Config,
        candidates: Vec<DeviceAddress>,
        collaborators: Collaborators,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;

        let shutdown = CancellationToken::new();
        let registry = Arc::new(DeviceRegistry::new(cfg));

        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&registry),
            Arc::clone(&collaborators.prober),
            collaborators.sink,
            MonitorSettings::new(cfg.probe_interval),
            cfg.max_monitors,
            shutdown.clone(),
        ));
        let pruner = Pruner::new(Arc::clone(&registry), cfg.retention);
        let feed = DiscoveryFeed::new(
            Arc::clone(&registry),
            collaborators.prober,
            collaborators.enricher,
            cfg.discovery_workers,
        );

        info!(
            "Monitoring {} candidate addresses, probing every {:?}",
            candidates.len(),
            cfg.probe_interval
        );

        let loops: Vec<(&'static str, JoinHandle<()>)> = vec![
            (
                "discovery",
                tokio::spawn(feed.run(candidates, cfg.discovery_interval, shutdown.clone())),
            ),
            (
                "reconciliation",
                tokio::spawn(Arc::clone(&reconciler).run(cfg.reconcile_interval)),
            ),
            (
                "pruning",
                tokio::spawn(pruner.run(cfg.prune_interval, shutdown.clone())),
            ),
        ];

        Ok(Self {
            registry,
            reconciler,
            shutdown,
            loops,
        })
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn health(&self) -> Health {
        self.registry.health()
    }

    pub async fn running_monitors(&self) -> usize {
        self.reconciler.running().await
    }

    /// A token that fires when the engine starts shutting down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops every loop and monitor, waiting for all of them to exit.
    pub async fn shutdown(self) {
        info!("Shutting down");
        self.shutdown.cancel();

        for (name, handle) in self.loops {
            if let Err(e) = handle.await {
                error!("The {name} loop failed: {e}");
            }
        }
    }
}
