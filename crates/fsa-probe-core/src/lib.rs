//! Core engine for FSA discovery and packet-loss measurement.
//!
//! Discovery runs once to fill a [`registry::DeviceRegistry`], then a
//! [`probe::ProbePool`] runs one loss probe task per discovered device until
//! the shared cancellation token fires or every task spends its send budget.

pub mod discovery;
pub mod error;
pub mod probe;
pub mod registry;
pub mod report;
pub mod types;

pub use error::{CoreError, Result};
pub use registry::DeviceRegistry;
pub use report::{NoopReporter, ReportHeading, Reporter};
pub use types::{DeviceRecord, ProbeStats, ProtocolVersion};

pub use tokio_util::sync::CancellationToken;
