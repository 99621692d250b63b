//! Per-device loss measurement.

pub mod pool;
pub mod worker;

pub use pool::{ProbePool, ShutdownReport, DEFAULT_SHUTDOWN_TIMEOUT};
pub use worker::{ProbeConfig, ProbeOutcome, ProbeWorker, StopReason};
