//! # Outbound Ports
//!
//! Collaborators the engine talks to but does not implement itself: the liveness
//! probe, SNMP-style enrichment and the time-series sink. Concrete adapters live
//! in [`crate::network`] and in the binary.

use std::time::Duration;

use async_trait::async_trait;
use watchr_common::network::address::DeviceAddress;
use watchr_common::network::device::Enrichment;

/// Raw result of one liveness probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Round-trip samples. A zero entry is not a valid measurement.
    pub rtts: Vec<Duration>,
    /// Replies counted by the probe mechanism itself. Informational only; some
    /// mechanisms report this unreliably.
    pub packets_received: usize,
}

impl ProbeReport {
    pub fn from_rtt(rtt: Duration) -> Self {
        Self {
            rtts: vec![rtt],
            packets_received: 1,
        }
    }

    /// The probe succeeded if it produced at least one non-zero timing sample.
    pub fn is_success(&self) -> bool {
        self.rtts.iter().any(|rtt| !rtt.is_zero())
    }

    /// Mean of the valid samples.
    pub fn average_rtt(&self) -> Option<Duration> {
        let valid: Vec<Duration> = self.rtts.iter().copied().filter(|r| !r.is_zero()).collect();
        let count: u32 = u32::try_from(valid.len()).ok().filter(|n| *n > 0)?;
        Some(valid.iter().sum::<Duration>() / count)
    }
}

#[async_trait]
pub trait Prober: Send + Sync {
    /// Probes `address` once. An `Err` counts as a failed probe.
    async fn probe(&self, address: &DeviceAddress) -> anyhow::Result<ProbeReport>;
}

#[async_trait]
pub trait Enricher: Send + Sync {
    /// Queries descriptive fields from `address`. An `Err` means no response.
    async fn enrich(&self, address: &DeviceAddress) -> anyhow::Result<Enrichment>;
}

#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn write_probe_result(
        &self,
        address: &DeviceAddress,
        rtt: Option<Duration>,
        success: bool,
    ) -> anyhow::Result<()>;
}
