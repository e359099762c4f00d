//! # Discovery Target Model
//!
//! Defines what the discovery feed sweeps for devices.
//!
//! A target string can be:
//! * A single IP address or hostname (e.g. `10.0.0.5`, `core-sw1.lan`).
//! * An IPv4 Range (e.g., `192.168.1.1-100`).
//! * A CIDR block (e.g., `192.168.1.0/24`).
//! * A comma separated list of any of the above.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::str::FromStr;

use thiserror::Error;

use super::address::{AddressError, DeviceAddress};
use super::range::{self, Ipv4Range};

/// Upper bound on the number of addresses a single target may expand to.
pub const MAX_TARGET_ADDRESSES: u64 = 65_536;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("invalid target {0:?}: {1}")]
    Invalid(String, String),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("target expands to {0} addresses, the limit is {MAX_TARGET_ADDRESSES}")]
    TooLarge(u64),
}

/// Represents a distinct set of addresses for the discovery feed to sweep.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// A single host, by IP literal or name.
    Host { address: DeviceAddress },
    /// An inclusive range of IPv4 addresses.
    Range { ipv4_range: Ipv4Range },
    /// Holds a list of different targets
    Multi { targets: Vec<Target> },
}

impl Target {
    /// Expands the target into its distinct addresses, in sorted order.
    pub fn addresses(&self) -> Result<Vec<DeviceAddress>, TargetError> {
        let total: u64 = self.len();
        if total > MAX_TARGET_ADDRESSES {
            return Err(TargetError::TooLarge(total));
        }

        let mut addresses: BTreeSet<DeviceAddress> = BTreeSet::new();
        self.collect_into(&mut addresses);
        Ok(addresses.into_iter().collect())
    }

    /// Number of addresses the target names, counting duplicates.
    pub fn len(&self) -> u64 {
        match self {
            Target::Host { .. } => 1,
            Target::Range { ipv4_range } => ipv4_range.len(),
            Target::Multi { targets } => targets.iter().map(Target::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect_into(&self, addresses: &mut BTreeSet<DeviceAddress>) {
        match self {
            Target::Host { address } => {
                addresses.insert(address.clone());
            }
            Target::Range { ipv4_range } => {
                addresses.extend(ipv4_range.to_iter().map(DeviceAddress::from));
            }
            Target::Multi { targets } => {
                for target in targets {
                    target.collect_into(addresses);
                }
            }
        }
    }
}

impl FromStr for Target {
    type Err = TargetError;

    /// Parses a string into a `Target`.
    ///
    /// Ranges and CIDR blocks are recognised first; anything else must be a
    /// valid single device address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s: &str = s.trim();

        if s.contains(',') {
            return parse_commas(s);
        }

        if let Some(target) = parse_cidr_range(s)? {
            return Ok(target);
        }

        if let Some(target) = parse_ip_range(s)? {
            return Ok(target);
        }

        let address: DeviceAddress = s.parse()?;
        Ok(Target::Host { address })
    }
}

/// Parses a comma-separated list of targets (e.g., "192.168.1.5, 10.0.0.1-50").
fn parse_commas(s: &str) -> Result<Target, TargetError> {
    let targets: Vec<Target> = s
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(Target::from_str)
        .collect::<Result<_, _>>()?;

    if targets.is_empty() {
        return Err(TargetError::Invalid(s.to_string(), "no targets listed".into()));
    }

    Ok(Target::Multi { targets })
}

/// Parses a range string like "1.1.1.1-2.2.2.2" or "1.1.1.1-50".
///
/// Returns `Ok(None)` when the start is not an IPv4 literal, so hostnames that
/// contain a dash fall through to host parsing.
fn parse_ip_range(s: &str) -> Result<Option<Target>, TargetError> {
    let Some((start_str, end_str)) = s.split_once('-') else {
        return Ok(None);
    };

    let Ok(start_addr) = start_str.parse::<Ipv4Addr>() else {
        return Ok(None);
    };

    let end_addr: Ipv4Addr = parse_range_end_addr(end_str, &start_addr)
        .map_err(|reason| TargetError::Invalid(s.to_string(), reason))?;

    let ipv4_range = Ipv4Range::new(start_addr, end_addr);
    if ipv4_range.is_empty() {
        return Err(TargetError::Invalid(
            s.to_string(),
            "range ends before it starts".into(),
        ));
    }

    Ok(Some(Target::Range { ipv4_range }))
}

/// Helper to parse the end address of a range.
///
/// Handles abbreviated forms like "192.168.1.1-50" (implies 192.168.1.50)
/// and full forms like "192.168.1.1-192.168.1.255".
fn parse_range_end_addr(end_str: &str, start_addr: &Ipv4Addr) -> Result<Ipv4Addr, String> {
    if let Ok(full_addr) = end_str.parse::<Ipv4Addr>() {
        return Ok(full_addr);
    }

    let partial_octets: Vec<u8> = end_str
        .split('.')
        .map(str::parse::<u8>)
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| format!("invalid end of range {end_str:?}: {e}"))?;

    if partial_octets.len() > 4 {
        return Err(format!("end of range has too many octets: {end_str}"));
    }

    let mut end_octets: [u8; 4] = start_addr.octets();
    let start_index: usize = 4 - partial_octets.len();
    end_octets[start_index..].copy_from_slice(&partial_octets);

    Ok(Ipv4Addr::from(end_octets))
}

/// Parses CIDR notation like "192.168.1.0/24".
fn parse_cidr_range(s: &str) -> Result<Option<Target>, TargetError> {
    let Some((ip_str, prefix_str)) = s.split_once('/') else {
        return Ok(None);
    };

    let invalid = |reason: String| TargetError::Invalid(s.to_string(), reason);

    let ipv4_addr: Ipv4Addr = ip_str
        .parse()
        .map_err(|e| invalid(format!("bad network address: {e}")))?;
    let prefix: u8 = prefix_str
        .parse()
        .map_err(|e| invalid(format!("bad prefix: {e}")))?;

    let ipv4_range: Ipv4Range =
        range::cidr_range(ipv4_addr, prefix).map_err(|e| invalid(e.to_string()))?;

    Ok(Some(Target::Range { ipv4_range }))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
