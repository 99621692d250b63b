//! Discovered devices, partitioned by protocol version.
//!
//! The broadcaster is the only writer. Once discovery finishes the registry
//! is moved into an `Arc` and its membership is frozen for the probing phase.

use std::net::IpAddr;
use std::sync::Arc;

use crate::types::{DeviceRecord, ProtocolVersion};

/// Two insertion-ordered, deduplicated device lists.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    v2: Vec<Arc<DeviceRecord>>,
    v3: Vec<Arc<DeviceRecord>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device unless its IP is already known under either version.
    ///
    /// Returns `true` when a new record was created. The first version seen
    /// for an IP is kept; later replies never re-classify it.
    pub fn insert(&mut self, ip: IpAddr, version: ProtocolVersion) -> bool {
        if self.contains(ip) {
            return false;
        }

        let record = Arc::new(DeviceRecord::new(ip, version));
        match version {
            ProtocolVersion::V2 => self.v2.push(record),
            ProtocolVersion::V3 => self.v3.push(record),
        }
        true
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.get(ip).is_some()
    }

    pub fn get(&self, ip: IpAddr) -> Option<&Arc<DeviceRecord>> {
        self.iter().find(|record| record.ip() == ip)
    }

    /// Devices of one protocol version, in discovery order.
    pub fn list(&self, version: ProtocolVersion) -> &[Arc<DeviceRecord>] {
        match version {
            ProtocolVersion::V2 => &self.v2,
            ProtocolVersion::V3 => &self.v3,
        }
    }

    pub fn v2(&self) -> &[Arc<DeviceRecord>] {
        &self.v2
    }

    pub fn v3(&self) -> &[Arc<DeviceRecord>] {
        &self.v3
    }

    /// All devices, V2 first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<DeviceRecord>> {
        self.v2.iter().chain(self.v3.iter())
    }

    pub fn len(&self) -> usize {
        self.v2.len() + self.v3.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v2.is_empty() && self.v3.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.insert(ip("192.168.137.10"), ProtocolVersion::V3));
        assert!(!registry.insert(ip("192.168.137.10"), ProtocolVersion::V3));

        assert_eq!(registry.v3().len(), 1);
        assert!(registry.v2().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_first_version_wins() {
        let mut registry = DeviceRegistry::new();
        registry.insert(ip("192.168.137.10"), ProtocolVersion::V3);
        assert!(!registry.insert(ip("192.168.137.10"), ProtocolVersion::V2));

        assert!(registry.v2().is_empty());
        assert_eq!(
            registry.get(ip("192.168.137.10")).unwrap().version(),
            ProtocolVersion::V3
        );
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let mut registry = DeviceRegistry::new();
        registry.insert(ip("192.168.137.30"), ProtocolVersion::V2);
        registry.insert(ip("192.168.137.20"), ProtocolVersion::V3);
        registry.insert(ip("192.168.137.10"), ProtocolVersion::V2);

        let v2: Vec<IpAddr> = registry.list(ProtocolVersion::V2).iter().map(|r| r.ip()).collect();
        assert_eq!(v2, vec![ip("192.168.137.30"), ip("192.168.137.10")]);

        let all: Vec<IpAddr> = registry.iter().map(|r| r.ip()).collect();
        assert_eq!(
            all,
            vec![ip("192.168.137.30"), ip("192.168.137.10"), ip("192.168.137.20")]
        );
    }

    #[test]
    fn test_empty_registry() {
        let registry = DeviceRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get(ip("10.0.0.1")).is_none());
    }
}
