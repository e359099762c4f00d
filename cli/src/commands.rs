pub mod discover;
pub mod monitor;

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use watchr_common::config::{CapacityPolicy, Config, SuspensionPolicy};
use watchr_common::network::target::Target;

#[derive(Parser)]
#[command(name = "watchr")]
#[command(about = "Continuous network device discovery and liveness monitoring.")]
pub struct CommandLine {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover and continuously monitor devices in a target
    #[command(alias = "m")]
    Monitor {
        target: Target,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Sweep a target once and list the devices that answer
    #[command(alias = "d")]
    Discover {
        target: Target,
        /// Concurrent probes
        #[arg(long, default_value_t = 64)]
        workers: usize,
        /// Probe timeout in milliseconds
        #[arg(long, default_value_t = 1_000)]
        timeout_ms: u64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CapacityArg {
    Reject,
    EvictOldest,
}

#[derive(Args)]
pub struct Tuning {
    /// Consecutive failures before a device is suspended (both protocols)
    #[arg(long, default_value_t = 3)]
    pub failure_threshold: u32,
    /// Suspension length in seconds
    #[arg(long, default_value_t = 300)]
    pub suspension_secs: u64,
    /// Seconds a device may go unseen before it is pruned
    #[arg(long, default_value_t = 86_400)]
    pub retention_secs: u64,
    /// Maximum number of tracked devices
    #[arg(long, default_value_t = 4096)]
    pub max_devices: usize,
    /// What to do when the device cap is reached
    #[arg(long, value_enum, default_value_t = CapacityArg::Reject)]
    pub on_full: CapacityArg,
    /// Maximum number of concurrently running monitors
    #[arg(long, default_value_t = 1024)]
    pub max_monitors: usize,
    /// Concurrent probes during discovery sweeps
    #[arg(long, default_value_t = 64)]
    pub workers: usize,
    /// Seconds between liveness probes of one device
    #[arg(long, default_value_t = 30)]
    pub probe_secs: u64,
    /// Probe timeout in milliseconds
    #[arg(long, default_value_t = 1_000)]
    pub timeout_ms: u64,
    /// Seconds between discovery sweeps
    #[arg(long, default_value_t = 300)]
    pub discovery_secs: u64,
}

impl Tuning {
    pub fn to_config(&self) -> Config {
        let policy = SuspensionPolicy {
            failure_threshold: self.failure_threshold,
            duration: Duration::from_secs(self.suspension_secs),
        };

        Config {
            ping: policy,
            snmp: policy,
            retention: Duration::from_secs(self.retention_secs),
            max_devices: self.max_devices,
            capacity_policy: match self.on_full {
                CapacityArg::Reject => CapacityPolicy::RejectNew,
                CapacityArg::EvictOldest => CapacityPolicy::EvictLeastRecentlySeen,
            },
            max_monitors: self.max_monitors,
            discovery_workers: self.workers,
            probe_interval: Duration::from_secs(self.probe_secs),
            probe_timeout: Duration::from_millis(self.timeout_ms),
            discovery_interval: Duration::from_secs(self.discovery_secs),
            ..Config::default()
        }
    }
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
