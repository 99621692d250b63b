//! CLI argument definitions using clap.

use std::net::IpAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use fsa_probe_core::discovery::service::{
    DiscoveryConfig, DEFAULT_BROADCAST, DISCOVERY_MESSAGE, DISCOVERY_PORT,
};
use fsa_probe_core::probe::worker::{
    ProbeConfig, DEFAULT_LOSS_THRESHOLD, DEFAULT_MAX_PROBES,
};
use fsa_probe_core::types::{V2_PROBE_PORT, V3_PROBE_PORT};

/// FSA probe - discover FSA devices and measure UDP packet loss
#[derive(Parser, Debug)]
#[command(name = "fsa-probe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output reports as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Broadcast once and list the devices that answer
    Discover(DiscoverArgs),

    /// Discover devices, then measure packet loss until Ctrl+C
    Monitor(MonitorArgs),
}

// ==================== Discovery ====================

#[derive(Args, Debug, Clone)]
pub struct DiscoveryOpts {
    /// Broadcast address for the discovery request
    #[arg(short, long, default_value_t = IpAddr::V4(DEFAULT_BROADCAST), env = "FSA_BROADCAST")]
    pub broadcast: IpAddr,

    /// Discovery UDP port
    #[arg(long, default_value_t = DISCOVERY_PORT, env = "FSA_DISCOVERY_PORT")]
    pub port: u16,

    /// How long to wait for discovery replies, in milliseconds
    #[arg(long, default_value = "3000", env = "FSA_DISCOVERY_TIMEOUT_MS")]
    pub discovery_timeout_ms: u64,

    /// Discovery challenge string
    #[arg(long, default_value = DISCOVERY_MESSAGE)]
    pub message: String,
}

impl DiscoveryOpts {
    pub fn to_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            broadcast: self.broadcast,
            port: self.port,
            timeout: Duration::from_millis(self.discovery_timeout_ms),
            message: self.message.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub discovery: DiscoveryOpts,
}

// ==================== Monitor ====================

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub discovery: DiscoveryOpts,

    /// Wait for each probe reply, in milliseconds
    #[arg(long, default_value = "200", env = "FSA_PROBE_TIMEOUT_MS")]
    pub probe_timeout_ms: u64,

    /// Probes sent per device before its worker stops
    #[arg(long, default_value_t = DEFAULT_MAX_PROBES, env = "FSA_MAX_PROBES")]
    pub max_probes: u64,

    /// Consecutive losses that raise a warning
    #[arg(long, default_value_t = DEFAULT_LOSS_THRESHOLD, value_parser = clap::value_parser!(u64).range(1..))]
    pub loss_threshold: u64,

    /// Probe port for V2 devices
    #[arg(long, default_value_t = V2_PROBE_PORT)]
    pub v2_port: u16,

    /// Probe port for V3 devices
    #[arg(long, default_value_t = V3_PROBE_PORT)]
    pub v3_port: u16,

    /// Time granted to workers after Ctrl+C, in milliseconds
    #[arg(long, default_value = "1000")]
    pub shutdown_timeout_ms: u64,

    /// Do not print a report on every lost probe
    #[arg(short, long)]
    pub quiet_loss: bool,
}

impl MonitorArgs {
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            recv_timeout: Duration::from_millis(self.probe_timeout_ms),
            max_probes: self.max_probes,
            loss_threshold: self.loss_threshold,
            v2_port: self.v2_port,
            v3_port: self.v3_port,
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
