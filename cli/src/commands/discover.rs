use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::*;
use watchr_common::config::Config;
use watchr_common::network::address::DeviceAddress;
use watchr_common::network::device::Device;
use watchr_common::network::target::Target;
use watchr_core::discovery::{DiscoveryFeed, SweepReport};
use watchr_core::network::tcp::TcpProber;
use watchr_core::registry::DeviceRegistry;

use crate::terminal::print;

pub async fn discover(target: Target, workers: usize, timeout: Duration) -> anyhow::Result<()> {
    let candidates: Vec<DeviceAddress> = target.addresses()?;
    let cfg = Config {
        discovery_workers: workers,
        probe_timeout: timeout,
        max_devices: candidates.len().max(1),
        ..Config::default()
    };
    cfg.validate()?;

    let registry = Arc::new(DeviceRegistry::new(&cfg));
    let feed = DiscoveryFeed::new(
        Arc::clone(&registry),
        Arc::new(TcpProber::new(cfg.probe_timeout)),
        None,
        cfg.discovery_workers,
    );

    let start_time: Instant = Instant::now();
    let report: SweepReport = feed.sweep(&candidates).await;

    print::header("discovery");
    let devices: Vec<Device> = registry.snapshot();
    for (idx, device) in devices.iter().enumerate() {
        let name: &str = device.enrichment.hostname.as_deref().unwrap_or("No hostname");
        print::tree_head(idx, name);
        print::as_tree_one_level(&[("Address", device.address.to_string())]);
    }

    let summary: String = format!(
        "{} of {} addresses answered in {:.2}s",
        report.responsive.len().to_string().bold().green(),
        report.probed,
        start_time.elapsed().as_secs_f64()
    );
    print::header("summary");
    tracing::info!("{summary}");
    Ok(())
}
