use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use watchr_common::config::{CapacityPolicy, Config};
use watchr_common::network::device::Protocol;
use watchr_core::registry::{DeviceRegistry, Health};
use watchr_core::suspension::Outcome;

use crate::support::addr;

fn fail(registry: &DeviceRegistry, address: &str, protocol: Protocol, times: u32) {
    for _ in 0..times {
        registry.update(&addr(address), Outcome::ProbeFailure(protocol));
    }
}

#[tokio::test(start_paused = true)]
async fn success_after_expiry_settles_counter_once() {
    let registry = DeviceRegistry::new(&Config::default());
    registry.add(&addr("10.1.0.1"));

    fail(&registry, "10.1.0.1", Protocol::Ping, 3);
    assert_eq!(registry.health().ping_suspended, 1);

    time::advance(Duration::from_secs(301)).await;
    registry.update(&addr("10.1.0.1"), Outcome::ProbeSuccess(Protocol::Ping));

    let device = registry.get(&addr("10.1.0.1")).unwrap();
    assert_eq!(device.ping.consecutive_fails, 0);
    assert!(device.ping.suspended_until.is_none());
    assert_eq!(registry.health().ping_suspended, 0);
}

#[tokio::test(start_paused = true)]
async fn failures_while_suspended_are_not_double_counted() {
    let registry = DeviceRegistry::new(&Config::default());
    registry.add(&addr("10.1.0.2"));

    fail(&registry, "10.1.0.2", Protocol::Snmp, 10);
    assert_eq!(registry.health().snmp_suspended, 1);
    assert_eq!(registry.get(&addr("10.1.0.2")).unwrap().snmp.consecutive_fails, 10);

    // A fresh run of failures after expiry suspends again, still only once.
    time::advance(Duration::from_secs(301)).await;
    fail(&registry, "10.1.0.2", Protocol::Snmp, 5);
    assert_eq!(registry.health().snmp_suspended, 1);
    assert_eq!(registry.health(), registry.recount());
}

#[tokio::test(start_paused = true)]
async fn protocols_are_counted_independently() {
    let registry = DeviceRegistry::new(&Config::default());
    registry.add(&addr("10.1.0.3"));

    fail(&registry, "10.1.0.3", Protocol::Ping, 3);
    fail(&registry, "10.1.0.3", Protocol::Snmp, 2);
    assert_eq!(
        registry.health(),
        Health {
            device_count: 1,
            ping_suspended: 1,
            snmp_suspended: 0,
        }
    );

    registry.update(&addr("10.1.0.3"), Outcome::ProbeSuccess(Protocol::Ping));
    fail(&registry, "10.1.0.3", Protocol::Snmp, 1);
    assert_eq!(registry.health().ping_suspended, 0);
    assert_eq!(registry.health().snmp_suspended, 1);
}

#[tokio::test(start_paused = true)]
async fn full_registry_rejects_new_devices() {
    let cfg = Config {
        max_devices: 2,
        capacity_policy: CapacityPolicy::RejectNew,
        ..Config::default()
    };
    let registry = DeviceRegistry::new(&cfg);

    assert!(registry.add(&addr("10.1.1.1")));
    assert!(registry.add(&addr("10.1.1.2")));
    assert!(!registry.add(&addr("10.1.1.3")));

    registry.update(&addr("10.1.1.3"), Outcome::ProbeSuccess(Protocol::Ping));
    fail(&registry, "10.1.1.3", Protocol::Ping, 5);

    assert_eq!(registry.health().device_count, 2);
    assert_eq!(registry.health().ping_suspended, 0);
    assert!(registry.get(&addr("10.1.1.3")).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_keep_counters_exact() {
    let registry = Arc::new(DeviceRegistry::new(&Config::default()));
    let addresses: Vec<String> = (1..=16).map(|i| format!("10.2.0.{i}")).collect();
    for address in &addresses {
        registry.add(&addr(address));
    }

    let mut tasks = Vec::new();
    for (i, address) in addresses.iter().cloned().enumerate() {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            // Even devices end on a failure run, odd ones recover at the end.
            for _ in 0..20 {
                registry.update(&addr(&address), Outcome::ProbeFailure(Protocol::Ping));
                tokio::task::yield_now().await;
            }
            if i % 2 == 1 {
                registry.update(&addr(&address), Outcome::ProbeSuccess(Protocol::Ping));
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(registry.health().ping_suspended, 8);
    assert_eq!(registry.health(), registry.recount());
}
