use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::time::{self, MissedTickBehavior};
use watchr_common::config::Config;
use watchr_common::network::address::DeviceAddress;
use watchr_common::network::target::Target;
use watchr_core::engine::{Collaborators, Engine};
use watchr_core::network::tcp::TcpProber;
use watchr_core::registry::Health;

use crate::sink::LogSink;
use crate::terminal::print;

pub async fn monitor(target: Target, cfg: Config) -> anyhow::Result<()> {
    let candidates: Vec<DeviceAddress> = target.addresses()?;

    let collaborators = Collaborators {
        prober: Arc::new(TcpProber::new(cfg.probe_timeout)),
        sink: Arc::new(LogSink),
        enricher: None,
    };
    let engine: Engine =
        Engine::start(&cfg, candidates, collaborators).context("invalid configuration")?;

    let watched: anyhow::Result<()> = watch(
        &engine,
        cfg.reconcile_interval,
        tokio::signal::ctrl_c(),
        |health, running| print::health(&health, running),
    )
    .await;

    engine.shutdown().await;
    print::header("stopped");
    watched
}

/// Reports engine health every `every` until `stop` resolves.
///
/// `stop` is polled as one future for the whole run, so a signal that lands
/// while a report is being written is still seen.
async fn watch<S>(
    engine: &Engine,
    every: Duration,
    stop: S,
    mut report: impl FnMut(Health, usize),
) -> anyhow::Result<()>
where
    S: Future<Output = std::io::Result<()>>,
{
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(stop);

    loop {
        tokio::select! {
            signal = &mut stop => return signal.context("listening for ctrl-c"),
            _ = ticker.tick() => report(engine.health(), engine.running_monitors().await),
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
    use async_trait::async_trait;
    use tokio::sync::oneshot;
    use watchr_core::ports::{ProbeReport, Prober};

    struct SilentProber;

    #[async_trait]
    impl Prober for SilentProber {
        async fn probe(&self, _address: &DeviceAddress) -> anyhow::Result<ProbeReport> {
            Ok(ProbeReport::default())
        }
    }

    fn engine() -> Engine {
        let collaborators = Collaborators {
            prober: Arc::new(SilentProber),
            sink: Arc::new(LogSink),
            enricher: None,
        };
        Engine::start(&Config::default(), Vec::new(), collaborators).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn stop_raised_during_report_ends_watch() {
        let engine = engine();
        let (tx, rx) = oneshot::channel::<()>();
        let stop = async move { rx.await.map_err(std::io::Error::other) };

        let mut tx: Option<oneshot::Sender<()>> = Some(tx);
        let mut reports: usize = 0;
        let watched = time::timeout(
            Duration::from_secs(60),
            watch(&engine, Duration::from_secs(5), stop, |_, _| {
                reports += 1;
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
            }),
        )
        .await;

        assert!(matches!(watched, Ok(Ok(()))));
        assert_eq!(reports, 1);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reports_every_interval_until_stopped() {
        let engine = engine();
        let stop = async {
            time::sleep(Duration::from_secs(12)).await;
            Ok::<(), std::io::Error>(())
        };

        let mut seen: Vec<Health> = Vec::new();
        watch(&engine, Duration::from_secs(5), stop, |health, _| seen.push(health))
            .await
            .unwrap();

        // Ticks at 0s, 5s and 10s.
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|health| health.device_count == 0));
        engine.shutdown().await;
    }
}
