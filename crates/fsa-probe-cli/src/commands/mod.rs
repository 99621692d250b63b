//! Command implementations.

pub mod discover;
pub mod monitor;

pub use discover::run_discover;
pub use monitor::run_monitor;
