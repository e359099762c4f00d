use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout};
use tracing::trace;
use watchr_common::network::address::DeviceAddress;

use crate::ports::{ProbeReport, Prober};

const DEFAULT_PORTS: [u16; 3] = [443, 80, 22];

/// Liveness probe that needs no raw-socket privileges.
///
/// A TCP handshake that completes, or is actively refused, proves the host is up
/// and yields one round-trip sample. Ports are tried in order until one answers.
pub struct TcpProber {
    ports: Vec<u16>,
    timeout: Duration,
}

impl TcpProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            timeout,
        }
    }

    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    async fn resolve(&self, address: &DeviceAddress) -> anyhow::Result<IpAddr> {
        if let Some(ip) = address.ip() {
            return Ok(ip);
        }

        let mut addrs = tokio::net::lookup_host((address.as_str(), 0))
            .await
            .with_context(|| format!("resolving {address}"))?;
        addrs
            .next()
            .map(|sock| sock.ip())
            .with_context(|| format!("{address} resolved to no addresses"))
    }

    async fn handshake(&self, socket_addr: SocketAddr) -> Option<Duration> {
        let started: Instant = Instant::now();

        match timeout(self.timeout, TcpStream::connect(socket_addr)).await {
            Ok(Ok(_)) => Some(started.elapsed()),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => Some(started.elapsed()),
            Ok(Err(e)) => {
                trace!("Handshake with {socket_addr} failed: {e}");
                None
            }
            Err(_elapsed) => None,
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, address: &DeviceAddress) -> anyhow::Result<ProbeReport> {
        let ip: IpAddr = self.resolve(address).await?;

        for port in &self.ports {
            if let Some(rtt) = self.handshake(SocketAddr::new(ip, *port)).await {
                // A sub-resolution loopback handshake can measure as zero.
                return Ok(ProbeReport::from_rtt(rtt.max(Duration::from_micros(1))));
            }
        }

        Ok(ProbeReport::default())
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

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn listening_port_is_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port: u16 = listener.local_addr().unwrap().port();

        let prober = TcpProber::new(Duration::from_secs(1)).with_ports(vec![port]);
        let report: ProbeReport = prober.probe(&"127.0.0.1".parse().unwrap()).await.unwrap();
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn refused_port_is_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port: u16 = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = TcpProber::new(Duration::from_secs(1)).with_ports(vec![port]);
        let report: ProbeReport = prober.probe(&"127.0.0.1".parse().unwrap()).await.unwrap();
        assert!(report.is_success());
    }

    #[tokio::test]
    #[ignore]
    async fn unreachable_host_times_out() {
        let prober = TcpProber::new(Duration::from_millis(100));
        let report: ProbeReport = prober.probe(&"203.0.113.1".parse().unwrap()).await.unwrap();
        assert!(!report.is_success());
    }
}
