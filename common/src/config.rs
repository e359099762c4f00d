//! # Monitoring Configuration
//!
//! Built once at startup and treated as immutable afterwards. An invalid
//! configuration is the only fatal error in the system, so everything is checked
//! up front by [`Config::validate`].

use std::time::Duration;

use thiserror::Error;

use crate::network::device::Protocol;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{protocol} failure threshold must be at least 1")]
    ZeroThreshold { protocol: Protocol },
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("{0} must be at least 1")]
    ZeroLimit(&'static str),
}

/// What the registry does when `add` is called at the device cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CapacityPolicy {
    /// Refuse the new address.
    #[default]
    RejectNew,
    /// Remove the device with the oldest `last_seen` to make room.
    EvictLeastRecentlySeen,
}

/// When a protocol's consecutive failures turn into a suspension, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspensionPolicy {
    pub failure_threshold: u32,
    pub duration: Duration,
}

impl Default for SuspensionPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            duration: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub ping: SuspensionPolicy,
    pub snmp: SuspensionPolicy,
    /// Devices unseen for longer than this are pruned.
    pub retention: Duration,
    pub max_devices: usize,
    pub capacity_policy: CapacityPolicy,
    /// Cap on concurrently running monitor tasks.
    pub max_monitors: usize,
    /// Concurrent probes allowed per discovery sweep.
    pub discovery_workers: usize,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub reconcile_interval: Duration,
    pub prune_interval: Duration,
    pub discovery_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ping: SuspensionPolicy::default(),
            snmp: SuspensionPolicy::default(),
            retention: Duration::from_secs(24 * 60 * 60),
            max_devices: 4096,
            capacity_policy: CapacityPolicy::default(),
            max_monitors: 1024,
            discovery_workers: 64,
            probe_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(1),
            reconcile_interval: Duration::from_secs(5),
            prune_interval: Duration::from_secs(60),
            discovery_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl Config {
    pub fn policy(&self, protocol: Protocol) -> SuspensionPolicy {
        match protocol {
            Protocol::Ping => self.ping,
            Protocol::Snmp => self.snmp,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for protocol in Protocol::ALL {
            let policy: SuspensionPolicy = self.policy(protocol);
            if policy.failure_threshold == 0 {
                return Err(ConfigError::ZeroThreshold { protocol });
            }
            if policy.duration.is_zero() {
                return Err(ConfigError::ZeroDuration(match protocol {
                    Protocol::Ping => "ping suspension duration",
                    Protocol::Snmp => "snmp suspension duration",
                }));
            }
        }

        let durations: [(&'static str, Duration); 6] = [
            ("retention window", self.retention),
            ("probe interval", self.probe_interval),
            ("probe timeout", self.probe_timeout),
            ("reconcile interval", self.reconcile_interval),
            ("prune interval", self.prune_interval),
            ("discovery interval", self.discovery_interval),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::ZeroDuration(*name));
        }

        let limits: [(&'static str, usize); 3] = [
            ("device cap", self.max_devices),
            ("monitor cap", self.max_monitors),
            ("discovery worker pool", self.discovery_workers),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, n)| *n == 0) {
            return Err(ConfigError::ZeroLimit(*name));
        }

        Ok(())
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
