//! UDP broadcast discovery.
//!
//! Provides reply classification and the one-shot broadcaster that fills the
//! device registry.

pub mod reply;
pub mod service;

pub use reply::parse_reply;
pub use service::{Broadcaster, DiscoveryConfig, DISCOVERY_PORT};
