//! # Device Registry
//!
//! The shared, thread-safe map of monitored devices and the owner of the
//! process-wide health counters.
//!
//! **Concurrency model:**
//! One `RwLock` guards the map. Every mutation runs under the write lock and goes
//! through [`suspension::transition`], whose [`Transition`] is the only input to the
//! aggregate counters. The counters themselves are atomics: they are written only
//! while the write lock is held and read lock-free by [`DeviceRegistry::health`].
//!
//! No network I/O ever happens while the lock is held, and log events raised
//! during a mutation are emitted only after the lock is released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::time::Instant;
use tracing::{debug, info, warn};
use watchr_common::config::{CapacityPolicy, Config, SuspensionPolicy};
use watchr_common::network::address::DeviceAddress;
use watchr_common::network::device::{Device, Protocol};

use crate::suspension::{self, Outcome, ProtocolEvent, Transition};

/// Point-in-time aggregate health, as served to status endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Health {
    pub device_count: usize,
    pub ping_suspended: usize,
    pub snmp_suspended: usize,
}

impl Health {
    pub fn suspended(&self, protocol: Protocol) -> usize {
        match protocol {
            Protocol::Ping => self.ping_suspended,
            Protocol::Snmp => self.snmp_suspended,
        }
    }
}

/// Something worth logging that happened under the write lock. Notices are
/// collected while the lock is held and emitted after it is released.
#[derive(Debug)]
enum Notice {
    Registered(DeviceAddress),
    Removed(DeviceAddress),
    Rejected(DeviceAddress),
    Evicted(DeviceAddress),
    Dropped(DeviceAddress, &'static str),
    Suspended(DeviceAddress, Protocol, u32),
    Recovered(DeviceAddress, Protocol),
    Expired(DeviceAddress, Protocol),
}

impl Notice {
    fn emit(&self, max_devices: usize) {
        match self {
            Notice::Registered(address) => debug!("Registered {address}"),
            Notice::Removed(address) => info!("Removed {address}"),
            Notice::Rejected(address) => {
                warn!("Device cap of {max_devices} reached, rejecting {address}")
            }
            Notice::Evicted(address) => {
                warn!("Device cap of {max_devices} reached, evicting {address}")
            }
            Notice::Dropped(address, reason) => debug!("Dropping outcome for {address}: {reason}"),
            Notice::Suspended(address, protocol, fails) => {
                info!("{address} suspended for {protocol} after {fails} consecutive failures")
            }
            Notice::Recovered(address, protocol) => info!("{address} recovered on {protocol}"),
            Notice::Expired(address, protocol) => {
                debug!("{address} suspension on {protocol} expired")
            }
        }
    }
}

pub struct DeviceRegistry {
    devices: RwLock<HashMap<DeviceAddress, Device>>,
    device_count: AtomicUsize,
    suspended: [AtomicUsize; 2],
    policies: [SuspensionPolicy; 2],
    max_devices: usize,
    capacity_policy: CapacityPolicy,
}

impl DeviceRegistry {
    pub fn new(cfg: &Config) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            device_count: AtomicUsize::new(0),
            suspended: [AtomicUsize::new(0), AtomicUsize::new(0)],
            policies: [cfg.policy(Protocol::Ping), cfg.policy(Protocol::Snmp)],
            max_devices: cfg.max_devices,
            capacity_policy: cfg.capacity_policy,
        }
    }

    /// Registers `address`, returning `true` when it was not known before.
    ///
    /// A known address counts as freshly seen. At the device cap the configured
    /// [`CapacityPolicy`] decides between refusing the address and evicting the
    /// least recently seen device.
    pub fn add(&self, address: &DeviceAddress) -> bool {
        let now: Instant = Instant::now();
        let mut notices: Vec<Notice> = Vec::new();

        let added: bool = {
            let mut devices = self.write();
            if let Some(device) = devices.get_mut(address) {
                self.settle(device, |_| ProtocolEvent::Untouched, now, &mut notices);
                device.last_seen = now;
                false
            } else {
                self.admit(&mut devices, address, now, &mut notices)
            }
        };

        self.emit(notices);
        added
    }

    /// Applies a probe or enrichment outcome to `address`.
    ///
    /// An unknown address is registered first when the outcome proves it answered,
    /// subject to the device cap; a failure for an unknown address is dropped. Every
    /// call acknowledges expired suspensions before the outcome is applied.
    pub fn update(&self, address: &DeviceAddress, outcome: Outcome) {
        let now: Instant = Instant::now();
        let mut notices: Vec<Notice> = Vec::new();

        {
            let mut devices = self.write();
            self.apply(&mut devices, address, outcome, now, &mut notices);
        }

        self.emit(notices);
    }

    /// Removes `address`, releasing any suspension it was counted under.
    pub fn remove(&self, address: &DeviceAddress) -> bool {
        let now: Instant = Instant::now();
        let mut notices: Vec<Notice> = Vec::new();

        let removed: bool = {
            let mut devices = self.write();
            self.remove_locked(&mut devices, address, now, &mut notices)
        };

        self.emit(notices);
        removed
    }

    /// Removes `address` only if it was last seen strictly before `cutoff`.
    ///
    /// The staleness check and the removal happen under one write lock, so a device
    /// that reports in between a snapshot and the removal is kept.
    pub fn remove_unseen_since(&self, address: &DeviceAddress, cutoff: Instant) -> bool {
        let now: Instant = Instant::now();
        let mut notices: Vec<Notice> = Vec::new();

        let removed: bool = {
            let mut devices = self.write();
            let is_stale: bool = devices
                .get(address)
                .is_some_and(|device| device.last_seen < cutoff);
            is_stale && self.remove_locked(&mut devices, address, now, &mut notices)
        };

        self.emit(notices);
        removed
    }

    /// Acknowledges every expired suspension, returning how many were cleared.
    pub fn sweep_expired(&self) -> usize {
        let now: Instant = Instant::now();
        let mut notices: Vec<Notice> = Vec::new();

        let cleared: usize = {
            let mut devices = self.write();
            devices
                .values_mut()
                .map(|device| {
                    self.settle(device, |_| ProtocolEvent::Untouched, now, &mut notices)
                        .iter()
                        .filter(|t| t.expired)
                        .count()
                })
                .sum()
        };

        self.emit(notices);
        cleared
    }

    /// Copies of every device, ordered by address.
    pub fn snapshot(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self.read().values().cloned().collect();
        devices.sort_by(|a, b| a.address.cmp(&b.address));
        devices
    }

    pub fn get(&self, address: &DeviceAddress) -> Option<Device> {
        self.read().get(address).cloned()
    }

    pub fn len(&self) -> usize {
        self.device_count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock-free read of the aggregate counters.
    pub fn health(&self) -> Health {
        Health {
            device_count: self.device_count.load(Ordering::Acquire),
            ping_suspended: self.suspended[Protocol::Ping.index()].load(Ordering::Acquire),
            snmp_suspended: self.suspended[Protocol::Snmp.index()].load(Ordering::Acquire),
        }
    }

    /// Recomputes the aggregate counters from a full scan.
    ///
    /// Counts every device holding a suspension timer, i.e. the suspensions the
    /// live counters are accountable for. Compare with [`Self::health`] to audit
    /// the counters.
    pub fn recount(&self) -> Health {
        let devices = self.read();
        let holding = |protocol: Protocol| {
            devices
                .values()
                .filter(|d| d.health(protocol).suspended_until.is_some())
                .count()
        };

        Health {
            device_count: devices.len(),
            ping_suspended: holding(Protocol::Ping),
            snmp_suspended: holding(Protocol::Snmp),
        }
    }

    fn apply(
        &self,
        devices: &mut HashMap<DeviceAddress, Device>,
        address: &DeviceAddress,
        outcome: Outcome,
        now: Instant,
        notices: &mut Vec<Notice>,
    ) {
        if !devices.contains_key(address) {
            if !outcome.is_observation() {
                notices.push(Notice::Dropped(address.clone(), "unknown device"));
                return;
            }
            if !self.admit(devices, address, now, notices) {
                notices.push(Notice::Dropped(address.clone(), "registry is full"));
                return;
            }
        }

        let Some(device) = devices.get_mut(address) else {
            return;
        };

        self.settle(device, |protocol| outcome.event_for(protocol), now, notices);

        if outcome.is_observation() {
            device.last_seen = now;
        }
        if let Outcome::Enrichment(fields) = outcome {
            device.enrichment.merge(fields);
        }
    }

    fn admit(
        &self,
        devices: &mut HashMap<DeviceAddress, Device>,
        address: &DeviceAddress,
        now: Instant,
        notices: &mut Vec<Notice>,
    ) -> bool {
        if devices.len() >= self.max_devices {
            match self.capacity_policy {
                CapacityPolicy::RejectNew => {
                    notices.push(Notice::Rejected(address.clone()));
                    return false;
                }
                CapacityPolicy::EvictLeastRecentlySeen => {
                    let oldest: Option<DeviceAddress> = devices
                        .values()
                        .min_by_key(|d| d.last_seen)
                        .map(|d| d.address.clone());
                    let Some(oldest) = oldest else {
                        return false;
                    };
                    notices.push(Notice::Evicted(oldest.clone()));
                    self.remove_locked(devices, &oldest, now, notices);
                }
            }
        }

        devices.insert(address.clone(), Device::new(address.clone(), now));
        self.device_count.store(devices.len(), Ordering::Release);
        notices.push(Notice::Registered(address.clone()));
        true
    }

    fn remove_locked(
        &self,
        devices: &mut HashMap<DeviceAddress, Device>,
        address: &DeviceAddress,
        now: Instant,
        notices: &mut Vec<Notice>,
    ) -> bool {
        let Some(device) = devices.get_mut(address) else {
            return false;
        };

        self.settle(device, |_| ProtocolEvent::Retire, now, notices);
        devices.remove(address);
        self.device_count.store(devices.len(), Ordering::Release);
        notices.push(Notice::Removed(address.clone()));
        true
    }

    /// Runs the transition for both protocols of `device` and applies the
    /// resulting counter deltas. The only writer of the suspension counters.
    fn settle(
        &self,
        device: &mut Device,
        event_for: impl Fn(Protocol) -> ProtocolEvent,
        now: Instant,
        notices: &mut Vec<Notice>,
    ) -> [Transition; 2] {
        Protocol::ALL.map(|protocol| {
            let policy: &SuspensionPolicy = &self.policies[protocol.index()];
            let (health, transition) =
                suspension::transition(*device.health(protocol), event_for(protocol), now, policy);
            *device.health_mut(protocol) = health;

            let counter: &AtomicUsize = &self.suspended[protocol.index()];
            match transition.counter_delta() {
                1 => {
                    counter.fetch_add(1, Ordering::AcqRel);
                }
                -1 => {
                    counter.fetch_sub(1, Ordering::AcqRel);
                }
                _ => {}
            }

            let address = || device.address.clone();
            if transition.entered_suspension() {
                notices.push(Notice::Suspended(address(), protocol, health.consecutive_fails));
            } else if transition.left_suspension() {
                notices.push(Notice::Recovered(address(), protocol));
            } else if transition.expired {
                notices.push(Notice::Expired(address(), protocol));
            }

            transition
        })
    }

    /// Logs `notices`. Must be called after the write guard is dropped.
    fn emit(&self, notices: Vec<Notice>) {
        for notice in &notices {
            notice.emit(self.max_devices);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<DeviceAddress, Device>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<DeviceAddress, Device>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
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
