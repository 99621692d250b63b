//! Ctrl+C handling.

use tokio::task::JoinHandle;
use tracing::{info, warn};

use fsa_probe_core::CancellationToken;

/// Cancel `token` on the first Ctrl+C.
///
/// The handler only sets the flag; the command that owns the token does the
/// final report and shutdown.
pub fn spawn_interrupt_handler(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("interrupt received, stopping");
                    token.cancel();
                }
                Err(e) => warn!("failed to listen for Ctrl+C: {}", e),
            },
            _ = token.cancelled() => {}
        }
    })
}
