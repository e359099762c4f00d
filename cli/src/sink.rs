use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use watchr_common::network::address::DeviceAddress;
use watchr_core::ports::MetricsSink;

/// Metrics sink that writes each probe result to the log.
pub struct LogSink;

#[async_trait]
impl MetricsSink for LogSink {
    async fn write_probe_result(
        &self,
        address: &DeviceAddress,
        rtt: Option<Duration>,
        success: bool,
    ) -> anyhow::Result<()> {
        match rtt {
            Some(rtt) => debug!("probe {address} ok={success} rtt={:.2}ms", rtt.as_secs_f64() * 1e3),
            None => debug!("probe {address} ok={success}"),
        }
        Ok(())
    }
}
