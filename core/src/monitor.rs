//! # Device Monitor
//!
//! One task per device. Probes on a fixed interval, turns each probe into a
//! registry outcome and forwards the timing to the metrics sink.
//!
//! The probe runs without any registry lock held; only the short
//! [`DeviceRegistry::update`] call afterwards touches shared state. Suspended
//! devices keep being probed so that a recovery is noticed as soon as it happens.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use watchr_common::network::address::DeviceAddress;
use watchr_common::network::device::Protocol;

use crate::ports::{MetricsSink, ProbeReport, Prober};
use crate::registry::DeviceRegistry;
use crate::suspension::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub probe_interval: Duration,
    /// Upper bound of the random delay before the first probe.
    pub max_start_jitter: Duration,
}

impl MonitorSettings {
    pub fn new(probe_interval: Duration) -> Self {
        Self {
            probe_interval,
            max_start_jitter: probe_interval,
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.max_start_jitter = Duration::ZERO;
        self
    }

    fn start_delay(&self) -> Duration {
        let max_millis: u64 = u64::try_from(self.max_start_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_millis == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::random_range(0..max_millis))
    }
}

pub struct Monitor {
    address: DeviceAddress,
    registry: Arc<DeviceRegistry>,
    prober: Arc<dyn Prober>,
    sink: Arc<dyn MetricsSink>,
    settings: MonitorSettings,
}

impl Monitor {
    pub fn new(
        address: DeviceAddress,
        registry: Arc<DeviceRegistry>,
        prober: Arc<dyn Prober>,
        sink: Arc<dyn MetricsSink>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            address,
            registry,
            prober,
            sink,
            settings,
        }
    }

    /// Probes until `cancel` fires. Cancellation is observed between ticks and
    /// also interrupts an in-flight probe.
    pub async fn run(self, cancel: CancellationToken) {
        debug!("Monitor for {} started", self.address);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = time::sleep(self.settings.start_delay()) => {}
        }

        let mut ticker = time::interval(self.settings.probe_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.prober.probe(&self.address) => result,
            };

            let report: ProbeReport = self.record(result);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.forward(&report) => {}
            }
        }

        debug!("Monitor for {} stopped", self.address);
    }

    fn record(&self, result: anyhow::Result<ProbeReport>) -> ProbeReport {
        let report: ProbeReport = result.unwrap_or_else(|e| {
            debug!("Probe of {} failed: {e:#}", self.address);
            ProbeReport::default()
        });

        let success: bool = report.is_success();
        let outcome: Outcome = if success {
            Outcome::ProbeSuccess(Protocol::Ping)
        } else {
            Outcome::ProbeFailure(Protocol::Ping)
        };
        self.registry.update(&self.address, outcome);
        report
    }

    /// Hands the result to the sink, giving up after one probe interval.
    async fn forward(&self, report: &ProbeReport) {
        let write = self
            .sink
            .write_probe_result(&self.address, report.average_rtt(), report.is_success());

        match time::timeout(self.settings.probe_interval, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Writing probe result for {} failed: {e:#}", self.address),
            Err(_) => warn!(
                "Writing probe result for {} timed out after {:?}",
                self.address, self.settings.probe_interval
            ),
        }
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
