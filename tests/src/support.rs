use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use watchr_common::network::address::DeviceAddress;
use watchr_core::ports::{MetricsSink, ProbeReport, Prober};

pub fn addr(s: &str) -> DeviceAddress {
    s.parse().unwrap()
}

/// Answers for the addresses in `alive`, times out for everything else.
#[derive(Default)]
pub struct FakeProber {
    alive: Mutex<HashSet<DeviceAddress>>,
    calls: AtomicUsize,
}

impl FakeProber {
    pub fn answering(alive: &[&str]) -> Self {
        Self {
            alive: Mutex::new(alive.iter().map(|s| addr(s)).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn silence(&self, address: &DeviceAddress) {
        self.alive.lock().unwrap().remove(address);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, address: &DeviceAddress) -> anyhow::Result<ProbeReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.alive.lock().unwrap().contains(address) {
            Ok(ProbeReport::from_rtt(Duration::from_millis(4)))
        } else {
            anyhow::bail!("timed out")
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub writes: Mutex<Vec<(DeviceAddress, bool)>>,
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn write_probe_result(
        &self,
        address: &DeviceAddress,
        _rtt: Option<Duration>,
        success: bool,
    ) -> anyhow::Result<()> {
        self.writes.lock().unwrap().push((address.clone(), success));
        Ok(())
    }
}
