use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use watchr_common::config::{Config, ConfigError};
use watchr_common::network::address::DeviceAddress;
use watchr_core::engine::{Collaborators, Engine};
use watchr_core::registry::DeviceRegistry;

use crate::support::{FakeProber, RecordingSink, addr};

fn collaborators(prober: &Arc<FakeProber>, sink: &Arc<RecordingSink>) -> Collaborators {
    Collaborators {
        prober: prober.clone(),
        sink: sink.clone(),
        enricher: None,
    }
}

fn candidates() -> Vec<DeviceAddress> {
    (1..=5).map(|i| addr(&format!("10.4.0.{i}"))).collect()
}

#[tokio::test(start_paused = true)]
async fn engine_discovers_monitors_and_shuts_down() {
    let cfg = Config {
        probe_interval: Duration::from_secs(10),
        ..Config::default()
    };
    let prober = Arc::new(FakeProber::answering(&["10.4.0.2", "10.4.0.4"]));
    let sink = Arc::new(RecordingSink::default());

    let engine = Engine::start(&cfg, candidates(), collaborators(&prober, &sink)).unwrap();
    let registry: Arc<DeviceRegistry> = Arc::clone(engine.registry());

    // One discovery sweep, a reconcile tick and a couple of probe rounds.
    time::sleep(cfg.reconcile_interval + Duration::from_secs(25)).await;

    assert_eq!(engine.health().device_count, 2);
    assert_eq!(engine.running_monitors().await, 2);
    assert!(
        sink.writes
            .lock()
            .unwrap()
            .iter()
            .all(|(address, success)| *success && registry.get(address).is_some())
    );

    let token = engine.shutdown_token();
    engine.shutdown().await;
    assert!(token.is_cancelled());

    // Nothing probes after shutdown returns.
    let calls: usize = prober.calls();
    time::sleep(Duration::from_secs(600)).await;
    assert_eq!(prober.calls(), calls);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let cfg = Config {
        max_monitors: 0,
        ..Config::default()
    };
    let prober = Arc::new(FakeProber::default());
    let sink = Arc::new(RecordingSink::default());

    let result = Engine::start(&cfg, candidates(), collaborators(&prober, &sink));
    assert!(matches!(result, Err(ConfigError::ZeroLimit(_))));
}
