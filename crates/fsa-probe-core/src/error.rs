//! Error types for the FSA probe engine.

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

/// Core error type for shared operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),
}

/// Discovery setup errors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to open broadcast socket: {0}")]
    Socket(#[source] std::io::Error),

    #[error("Failed to send discovery broadcast to {addr}: {source}")]
    Broadcast {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Probe worker setup errors
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed to bind probe socket for {ip}: {source}")]
    Bind {
        ip: IpAddr,
        #[source]
        source: std::io::Error,
    },
}

/// A discovery reply that could not be classified.
///
/// Never fatal: the broadcaster logs it and keeps listening.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("reply is not JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("reply is not a JSON object")]
    NotAnObject,
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
