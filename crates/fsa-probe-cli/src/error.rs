//! Error types for the FSA probe CLI.
//!
//! CliError wraps CoreError from the engine and adds CLI-specific variants.

use fsa_probe_core::error::CoreError;
use thiserror::Error;

/// Exit codes for the CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NETWORK_ERROR: i32 = 2;
}

/// Main error type for the CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("No devices found")]
    NoDevicesFound,
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Core(e) => match e {
                CoreError::Discovery(_) | CoreError::Probe(_) => exit_codes::NETWORK_ERROR,
            },
            CliError::NoDevicesFound => exit_codes::GENERAL_ERROR,
        }
    }
}
