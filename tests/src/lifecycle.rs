use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use watchr_common::config::Config;
use watchr_common::network::device::Protocol;
use watchr_core::monitor::MonitorSettings;
use watchr_core::prune::{PruneReport, Pruner};
use watchr_core::reconcile::{ReconcileReport, Reconciler};
use watchr_core::registry::DeviceRegistry;
use watchr_core::suspension::Outcome;

use crate::support::{FakeProber, RecordingSink, addr};

const PROBE_INTERVAL: Duration = Duration::from_secs(1000);

struct Harness {
    registry: Arc<DeviceRegistry>,
    reconciler: Reconciler,
    pruner: Pruner,
    prober: Arc<FakeProber>,
}

fn harness(cfg: Config, alive: &[&str]) -> Harness {
    let registry = Arc::new(DeviceRegistry::new(&cfg));
    let prober = Arc::new(FakeProber::answering(alive));
    let reconciler = Reconciler::new(
        Arc::clone(&registry),
        prober.clone(),
        Arc::new(RecordingSink::default()),
        MonitorSettings::new(PROBE_INTERVAL).without_jitter(),
        cfg.max_monitors,
        CancellationToken::new(),
    );
    let pruner = Pruner::new(Arc::clone(&registry), cfg.retention);
    Harness {
        registry,
        reconciler,
        pruner,
        prober,
    }
}

#[tokio::test(start_paused = true)]
async fn pruning_suspended_device_stops_its_monitor() {
    let cfg = Config {
        retention: Duration::from_secs(120),
        ..Config::default()
    };
    let h = harness(cfg, &[]);
    let y = addr("10.3.0.9");

    h.registry.add(&y);
    for _ in 0..3 {
        h.registry.update(&y, Outcome::ProbeFailure(Protocol::Snmp));
    }
    assert_eq!(h.registry.health().snmp_suspended, 1);

    let started: ReconcileReport = h.reconciler.tick().await;
    assert_eq!(started.started, vec![y.clone()]);

    // Still inside the 300s suspension, but past retention.
    time::sleep(Duration::from_secs(121)).await;
    let pruned: PruneReport = h.pruner.tick();
    assert_eq!(pruned.removed, vec![y.clone()]);
    assert_eq!(h.registry.health().snmp_suspended, 0);
    assert_eq!(h.registry.health().ping_suspended, 0);
    assert!(h.registry.snapshot().is_empty());

    let stopped: ReconcileReport = h.reconciler.tick().await;
    assert_eq!(stopped.stopped, vec![y]);
    assert_eq!(h.reconciler.running().await, 0);
}

#[tokio::test(start_paused = true)]
async fn stale_monitor_cannot_resurrect_pruned_device() {
    let cfg = Config {
        retention: Duration::from_secs(60),
        ..Config::default()
    };
    let h = harness(cfg, &[]);
    let x = addr("10.3.0.1");
    h.registry.add(&x);
    h.reconciler.tick().await;

    time::sleep(Duration::from_secs(61)).await;
    h.pruner.tick();
    assert!(h.registry.is_empty());

    // The monitor is still running until the next tick; its failures are dropped.
    time::sleep(PROBE_INTERVAL).await;
    assert!(h.prober.calls() >= 2);
    assert!(h.registry.is_empty());

    h.reconciler.tick().await;
    assert_eq!(h.reconciler.running().await, 0);
}

#[tokio::test(start_paused = true)]
async fn repeated_ticks_are_idempotent() {
    let h = harness(Config::default(), &["10.3.1.1", "10.3.1.2"]);
    h.registry.add(&addr("10.3.1.1"));
    h.registry.add(&addr("10.3.1.2"));

    let first: ReconcileReport = h.reconciler.tick().await;
    assert_eq!(first.started.len(), 2);

    for _ in 0..3 {
        assert!(h.reconciler.tick().await.is_noop());
    }
    assert_eq!(h.reconciler.running().await, 2);

    h.registry.remove(&addr("10.3.1.1"));
    let report: ReconcileReport = h.reconciler.tick().await;
    assert_eq!(report.stopped, vec![addr("10.3.1.1")]);
    assert!(report.started.is_empty());
    assert_eq!(
        h.reconciler.running_addresses().await.into_iter().collect::<Vec<_>>(),
        vec![addr("10.3.1.2")]
    );

    h.reconciler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn successful_probes_keep_device_from_pruning() {
    let cfg = Config {
        retention: Duration::from_secs(120),
        ..Config::default()
    };
    let registry = Arc::new(DeviceRegistry::new(&cfg));
    let prober = Arc::new(FakeProber::answering(&["10.3.2.1", "10.3.2.2"]));
    let reconciler = Reconciler::new(
        Arc::clone(&registry),
        prober.clone(),
        Arc::new(RecordingSink::default()),
        MonitorSettings::new(Duration::from_secs(30)).without_jitter(),
        cfg.max_monitors,
        CancellationToken::new(),
    );
    let pruner = Pruner::new(Arc::clone(&registry), cfg.retention);

    registry.add(&addr("10.3.2.1"));
    registry.add(&addr("10.3.2.2"));
    reconciler.tick().await;
    prober.silence(&addr("10.3.2.2"));

    time::sleep(Duration::from_secs(125)).await;
    let report: PruneReport = pruner.tick();
    assert_eq!(report.removed, vec![addr("10.3.2.2")]);
    assert!(registry.get(&addr("10.3.2.1")).is_some());

    reconciler.stop_all().await;
}
