//! # Device Model
//!
//! The per-device record held by the registry, together with the per-protocol
//! health state that suspension decisions are computed from.

use std::fmt;

use tokio::time::Instant;

use super::address::DeviceAddress;

/// A liveness protocol with its own failure counter, suspension timer and
/// aggregate "actively suspended" counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Ping,
    Snmp,
}

impl Protocol {
    pub const ALL: [Protocol; 2] = [Protocol::Ping, Protocol::Snmp];

    /// Stable index used to address per-protocol arrays.
    pub const fn index(self) -> usize {
        match self {
            Protocol::Ping => 0,
            Protocol::Snmp => 1,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ping => f.write_str("ping"),
            Protocol::Snmp => f.write_str("snmp"),
        }
    }
}

/// Failure bookkeeping for one protocol of one device.
///
/// `suspended_until == None` means "not suspended". `Some(t)` with `t` in the past
/// means the suspension has expired but has not yet been acknowledged by a
/// registry mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolHealth {
    pub consecutive_fails: u32,
    pub suspended_until: Option<Instant>,
}

impl ProtocolHealth {
    /// Whether a suspension is in force at `now`.
    pub fn is_suspended_at(&self, now: Instant) -> bool {
        self.suspended_until.is_some_and(|until| now < until)
    }

    /// Whether a suspension timer is set but has already run out at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.suspended_until.is_some_and(|until| now >= until)
    }
}

/// Descriptive fields gathered by SNMP enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub hostname: Option<String>,
    pub description: Option<String>,
    pub object_id: Option<String>,
}

impl Enrichment {
    /// Overwrites the fields that `other` carries, keeping the rest.
    pub fn merge(&mut self, other: Enrichment) {
        if other.hostname.is_some() {
            self.hostname = other.hostname;
        }
        if other.description.is_some() {
            self.description = other.description;
        }
        if other.object_id.is_some() {
            self.object_id = other.object_id;
        }
    }
}

/// A monitored network device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub address: DeviceAddress,
    pub last_seen: Instant,
    pub ping: ProtocolHealth,
    pub snmp: ProtocolHealth,
    pub enrichment: Enrichment,
}

impl Device {
    pub fn new(address: DeviceAddress, seen_at: Instant) -> Self {
        Self {
            address,
            last_seen: seen_at,
            ping: ProtocolHealth::default(),
            snmp: ProtocolHealth::default(),
            enrichment: Enrichment::default(),
        }
    }

    pub fn health(&self, protocol: Protocol) -> &ProtocolHealth {
        match protocol {
            Protocol::Ping => &self.ping,
            Protocol::Snmp => &self.snmp,
        }
    }

    pub fn health_mut(&mut self, protocol: Protocol) -> &mut ProtocolHealth {
        match protocol {
            Protocol::Ping => &mut self.ping,
            Protocol::Snmp => &mut self.snmp,
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn suspension_window_is_half_open() {
        let now: Instant = Instant::now();
        let health = ProtocolHealth {
            consecutive_fails: 3,
            suspended_until: Some(now + Duration::from_secs(10)),
        };

        assert!(health.is_suspended_at(now));
        assert!(!health.is_expired_at(now));
        assert!(!health.is_suspended_at(now + Duration::from_secs(10)));
        assert!(health.is_expired_at(now + Duration::from_secs(10)));
    }

    #[test]
    fn unset_timer_is_neither_suspended_nor_expired() {
        let health = ProtocolHealth::default();
        let now: Instant = Instant::now();
        assert!(!health.is_suspended_at(now));
        assert!(!health.is_expired_at(now));
    }

    #[test]
    fn merge_keeps_fields_missing_from_update() {
        let mut current = Enrichment {
            hostname: Some("edge-rtr".into()),
            description: Some("Cisco IOS".into()),
            object_id: None,
        };
        current.merge(Enrichment {
            hostname: None,
            description: Some("Cisco IOS XE".into()),
            object_id: Some("1.3.6.1.4.1.9.1.1".into()),
        });

        assert_eq!(current.hostname.as_deref(), Some("edge-rtr"));
        assert_eq!(current.description.as_deref(), Some("Cisco IOS XE"));
        assert_eq!(current.object_id.as_deref(), Some("1.3.6.1.4.1.9.1.1"));
    }

    #[test]
    fn protocol_indices_are_distinct() {
        assert_ne!(Protocol::Ping.index(), Protocol::Snmp.index());
        assert_eq!(Protocol::ALL.len(), 2);
    }
}
