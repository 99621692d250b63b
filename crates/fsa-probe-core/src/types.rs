//! Device and statistics types shared by discovery, probing and reporting.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// UDP port a V2 device answers loss probes on
pub const V2_PROBE_PORT: u16 = 2335;

/// UDP port a V3 device answers loss probes on
pub const V3_PROBE_PORT: u16 = 2340;

/// Single-byte V2 probe
pub const V2_PROBE_PAYLOAD: [u8; 1] = [0x1D];

/// Fixed 8-byte V3 probe
pub const V3_PROBE_PAYLOAD: [u8; 8] = [0x00, 0x00, 0x00, 0x02, 0x34, 0x83, 0x64, 0x87];

/// `timeout_rate` is expressed as loss per ten-thousand probes.
pub const RATE_SCALE: f64 = 10_000.0;

/// Wire protocol generation spoken by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    V2,
    V3,
}

impl ProtocolVersion {
    /// Classify the `protocol_version` field of a discovery reply.
    ///
    /// Only `3` selects V3; every other value falls back to V2.
    pub fn from_wire(value: i64) -> Self {
        if value == 3 {
            ProtocolVersion::V3
        } else {
            ProtocolVersion::V2
        }
    }

    /// Default destination port for loss probes.
    pub fn probe_port(&self) -> u16 {
        match self {
            ProtocolVersion::V2 => V2_PROBE_PORT,
            ProtocolVersion::V3 => V3_PROBE_PORT,
        }
    }

    /// Fixed probe datagram for this version.
    pub fn probe_payload(&self) -> &'static [u8] {
        match self {
            ProtocolVersion::V2 => &V2_PROBE_PAYLOAD,
            ProtocolVersion::V3 => &V3_PROBE_PAYLOAD,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V2 => "v2",
            ProtocolVersion::V3 => "v3",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running loss counters for one device.
///
/// Every mutator recomputes `timeout_rate`, so a snapshot always satisfies
/// `timeout_rate == timeout_cnt / all_cnt * RATE_SCALE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeStats {
    /// Probes sent
    pub all_cnt: u64,
    /// Probes that got no reply in time
    pub timeout_cnt: u64,
    /// Consecutive timeouts since the last reply
    pub continuous_cnt: u64,
    /// Loss per ten-thousand probes
    pub timeout_rate: f64,
}

impl ProbeStats {
    pub fn record_sent(&mut self) {
        self.all_cnt += 1;
        self.recompute_rate();
    }

    pub fn record_reply(&mut self) {
        self.continuous_cnt = 0;
        self.recompute_rate();
    }

    pub fn record_timeout(&mut self) {
        debug_assert!(self.timeout_cnt < self.all_cnt, "timeout without a send");
        self.timeout_cnt += 1;
        self.continuous_cnt += 1;
        self.recompute_rate();
    }

    /// Loss as a percentage, for display.
    pub fn loss_percent(&self) -> f64 {
        self.timeout_rate / 100.0
    }

    fn recompute_rate(&mut self) {
        self.timeout_rate = if self.all_cnt == 0 {
            0.0
        } else {
            self.timeout_cnt as f64 / self.all_cnt as f64 * RATE_SCALE
        };
    }
}

/// One addressable FSA unit found during discovery.
///
/// Identity (`ip`, `version`) is fixed at creation. The counters are written
/// only by the device's own probe worker; readers take copies via
/// [`DeviceRecord::stats`].
#[derive(Debug)]
pub struct DeviceRecord {
    ip: IpAddr,
    version: ProtocolVersion,
    discovered_at: DateTime<Utc>,
    stats: RwLock<ProbeStats>,
}

impl DeviceRecord {
    pub fn new(ip: IpAddr, version: ProtocolVersion) -> Self {
        Self {
            ip,
            version,
            discovered_at: Utc::now(),
            stats: RwLock::new(ProbeStats::default()),
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Copy of the current counters.
    pub fn stats(&self) -> ProbeStats {
        *self.stats.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to the counters and return the resulting snapshot.
    pub fn update<F>(&self, f: F) -> ProbeStats
    where
        F: FnOnce(&mut ProbeStats),
    {
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
        *stats
    }

    /// Serializable view for reporting.
    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            ip: self.ip.to_string(),
            protocol_version: self.version,
            discovered_at: self.discovered_at,
            stats: self.stats(),
        }
    }

    pub(crate) fn probe_target(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.ip, port)
    }
}

/// Point-in-time copy of a [`DeviceRecord`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub ip: String,
    pub protocol_version: ProtocolVersion,
    pub discovered_at: DateTime<Utc>,
    #[serde(flatten)]
    pub stats: ProbeStats,
}
