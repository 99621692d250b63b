//! Discover command implementation.

use fsa_probe_core::CancellationToken;

use crate::cli::DiscoverArgs;
use crate::device::discovery::discover_devices;
use crate::device::interrupt::spawn_interrupt_handler;
use crate::error::CliError;
use crate::output::{get_formatter, ConsoleReporter};

/// Run the discover command
pub async fn run_discover(args: DiscoverArgs, json: bool) -> Result<(), CliError> {
    let reporter = ConsoleReporter::new(get_formatter(json), false);

    let cancel = CancellationToken::new();
    let interrupt = spawn_interrupt_handler(cancel.clone());

    let result = discover_devices(args.discovery.to_config(), cancel, &reporter).await;
    interrupt.abort();

    if result?.is_empty() {
        return Err(CliError::NoDevicesFound);
    }

    Ok(())
}
