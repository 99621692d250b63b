//! Reporting seam between the engine and whatever renders its state.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::registry::DeviceRegistry;
use crate::types::DeviceSnapshot;

/// Why a report is being produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportHeading {
    /// Discovery window closed
    SearchResults,
    /// A probe to this device timed out
    LossEvent(IpAddr),
    /// Operator interrupt
    Cancelled,
    /// Every worker spent its send budget
    Finished,
}

impl ReportHeading {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportHeading::SearchResults => "search results",
            ReportHeading::LossEvent(_) => "loss event",
            ReportHeading::Cancelled => "cancelled",
            ReportHeading::Finished => "finished",
        }
    }
}

impl fmt::Display for ReportHeading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportHeading::LossEvent(ip) => write!(f, "loss event ({})", ip),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Receives registry state at discovery end, on loss events and at shutdown.
///
/// Called concurrently from probe workers, so implementations must only read
/// the registry and serialize their own output.
pub trait Reporter: Send + Sync {
    fn report(&self, heading: ReportHeading, registry: &DeviceRegistry);
}

/// Reporter that discards everything.
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, _heading: ReportHeading, _registry: &DeviceRegistry) {}
}

/// Serializable copy of the whole registry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySummary {
    pub generated_at: DateTime<Utc>,
    pub v2: Vec<DeviceSnapshot>,
    pub v3: Vec<DeviceSnapshot>,
    pub count: usize,
}

impl RegistrySummary {
    pub fn collect(registry: &DeviceRegistry) -> Self {
        let v2: Vec<DeviceSnapshot> = registry.v2().iter().map(|r| r.snapshot()).collect();
        let v3: Vec<DeviceSnapshot> = registry.v3().iter().map(|r| r.snapshot()).collect();
        Self {
            generated_at: Utc::now(),
            count: v2.len() + v3.len(),
            v2,
            v3,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Reporter that remembers every heading it was handed.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingReporter {
    pub headings: std::sync::Mutex<Vec<ReportHeading>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub fn headings(&self) -> Vec<ReportHeading> {
        self.headings.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Reporter for RecordingReporter {
    fn report(&self, heading: ReportHeading, _registry: &DeviceRegistry) {
        self.headings.lock().unwrap().push(heading);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProtocolVersion;

    #[test]
    fn test_heading_display() {
        let ip: IpAddr = "192.168.137.5".parse().unwrap();
        assert_eq!(ReportHeading::SearchResults.to_string(), "search results");
        assert_eq!(
            ReportHeading::LossEvent(ip).to_string(),
            "loss event (192.168.137.5)"
        );
        assert_eq!(ReportHeading::LossEvent(ip).as_str(), "loss event");
    }

    #[test]
    fn test_summary_partitions_by_version() {
        let mut registry = DeviceRegistry::new();
        registry.insert("192.168.137.5".parse().unwrap(), ProtocolVersion::V2);
        registry.insert("192.168.137.6".parse().unwrap(), ProtocolVersion::V3);
        registry.insert("192.168.137.7".parse().unwrap(), ProtocolVersion::V3);

        let summary = RegistrySummary::collect(&registry);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.v2.len(), 1);
        assert_eq!(summary.v3[1].ip, "192.168.137.7");
        assert!(!summary.is_empty());

        assert!(RegistrySummary::collect(&DeviceRegistry::new()).is_empty());
    }
}
