//! # Monitor Reconciliation
//!
//! Keeps the set of running [`Monitor`] tasks equal to the registry's device set.
//!
//! The reconciler owns its own task registry (address to cancellation handle),
//! separate from the [`DeviceRegistry`], so device-state locking and task
//! lifecycle never share a lock.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use watchr_common::network::address::DeviceAddress;

use crate::monitor::{Monitor, MonitorSettings};
use crate::ports::{MetricsSink, Prober};
use crate::registry::DeviceRegistry;

struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// What one reconciliation tick changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub started: Vec<DeviceAddress>,
    pub stopped: Vec<DeviceAddress>,
    /// Devices left unmonitored this tick because the monitor cap was reached.
    pub deferred: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty() && self.deferred == 0
    }
}

pub struct Reconciler {
    registry: Arc<DeviceRegistry>,
    prober: Arc<dyn Prober>,
    sink: Arc<dyn MetricsSink>,
    settings: MonitorSettings,
    max_monitors: usize,
    shutdown: CancellationToken,
    tasks: Mutex<HashMap<DeviceAddress, MonitorHandle>>,
}

impl Reconciler {
    /// Every monitor's cancellation is a child of `shutdown`.
    pub fn new(
        registry: Arc<DeviceRegistry>,
        prober: Arc<dyn Prober>,
        sink: Arc<dyn MetricsSink>,
        settings: MonitorSettings,
        max_monitors: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            prober,
            sink,
            settings,
            max_monitors,
            shutdown,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Starts monitors for new devices and stops monitors of removed ones.
    ///
    /// Stopped monitors are awaited before they leave the task registry. Starting
    /// is skipped once `max_monitors` are running; those devices are picked up by
    /// a later tick.
    pub async fn tick(&self) -> ReconcileReport {
        let wanted: BTreeSet<DeviceAddress> = self
            .registry
            .snapshot()
            .into_iter()
            .map(|device| device.address)
            .collect();

        let mut tasks = self.tasks.lock().await;
        let mut report = ReconcileReport::default();

        // A monitor that ended on its own (panic) is restarted below.
        tasks.retain(|address, handle| {
            let alive: bool = !handle.task.is_finished();
            if !alive {
                error!("Monitor for {address} exited unexpectedly");
            }
            alive
        });

        let stale: Vec<DeviceAddress> = tasks
            .keys()
            .filter(|address| !wanted.contains(*address))
            .cloned()
            .collect();

        for address in &stale {
            if let Some(handle) = tasks.get(address) {
                handle.cancel.cancel();
            }
        }
        for address in stale {
            if let Some(handle) = tasks.get_mut(&address)
                && let Err(e) = (&mut handle.task).await
            {
                error!("Monitor for {address} failed: {e}");
            }
            tasks.remove(&address);
            report.stopped.push(address);
        }

        for address in wanted {
            if tasks.contains_key(&address) {
                continue;
            }
            if tasks.len() >= self.max_monitors {
                report.deferred += 1;
                continue;
            }
            let handle: MonitorHandle = self.spawn(address.clone());
            tasks.insert(address.clone(), handle);
            report.started.push(address);
        }

        if report.deferred > 0 {
            debug!(
                "Monitor cap of {} reached, deferring {} devices",
                self.max_monitors, report.deferred
            );
        }
        if !report.started.is_empty() || !report.stopped.is_empty() {
            info!(
                "Reconciled monitors: {} started, {} stopped, {} running",
                report.started.len(),
                report.stopped.len(),
                tasks.len()
            );
        }

        report
    }

    pub async fn running(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn running_addresses(&self) -> BTreeSet<DeviceAddress> {
        self.tasks.lock().await.keys().cloned().collect()
    }

    /// Cancels every monitor and waits for all of them to exit.
    pub async fn stop_all(&self) {
        let mut tasks = self.tasks.lock().await;

        for handle in tasks.values() {
            handle.cancel.cancel();
        }
        for (address, handle) in tasks.drain() {
            if let Err(e) = handle.task.await {
                error!("Monitor for {address} failed: {e}");
            }
        }
    }

    /// Ticks every `interval` until shutdown, then stops all monitors.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.tick().await;
        }

        self.stop_all().await;
        debug!("Reconciliation loop stopped");
    }

    fn spawn(&self, address: DeviceAddress) -> MonitorHandle {
        let cancel: CancellationToken = self.shutdown.child_token();
        let monitor = Monitor::new(
            address,
            Arc::clone(&self.registry),
            Arc::clone(&self.prober),
            Arc::clone(&self.sink),
            self.settings,
        );
        let task: JoinHandle<()> = tokio::spawn(monitor.run(cancel.clone()));
        MonitorHandle { cancel, task }
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
