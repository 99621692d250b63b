//! Monitor command: discovery followed by continuous loss measurement.

use std::sync::Arc;

use tracing::{info, warn};

use fsa_probe_core::probe::ProbePool;
use fsa_probe_core::report::{ReportHeading, Reporter};
use fsa_probe_core::CancellationToken;

use crate::cli::MonitorArgs;
use crate::device::discovery::discover_devices;
use crate::device::interrupt::spawn_interrupt_handler;
use crate::error::CliError;
use crate::output::{get_formatter, ConsoleReporter};

/// Run the monitor command
pub async fn run_monitor(args: MonitorArgs, json: bool) -> Result<(), CliError> {
    let reporter = Arc::new(ConsoleReporter::new(get_formatter(json), args.quiet_loss));

    let cancel = CancellationToken::new();
    let interrupt = spawn_interrupt_handler(cancel.clone());

    let result = monitor(&args, cancel, reporter).await;
    interrupt.abort();

    result
}

/// Discover, probe every device until `cancel` fires or all budgets are
/// spent, then hand the final summary to `reporter`.
///
/// An empty discovery or an interrupt is not an error.
async fn monitor(
    args: &MonitorArgs,
    cancel: CancellationToken,
    reporter: Arc<dyn Reporter>,
) -> Result<(), CliError> {
    let registry = discover_devices(args.discovery.to_config(), cancel.clone(), reporter.as_ref()).await?;
    let registry = Arc::new(registry);

    if cancel.is_cancelled() {
        reporter.report(ReportHeading::Cancelled, &registry);
        return Ok(());
    }

    if registry.is_empty() {
        // Search results already told the user nobody answered
        return Ok(());
    }

    let mut pool = ProbePool::spawn(
        registry.clone(),
        reporter.clone(),
        args.probe_config(),
        cancel.clone(),
    )
    .await?;

    info!(
        v2 = registry.v2().len(),
        v3 = registry.v3().len(),
        "measuring packet loss, press Ctrl+C to stop"
    );

    let heading = tokio::select! {
        _ = cancel.cancelled() => ReportHeading::Cancelled,
        _ = pool.wait() => ReportHeading::Finished,
    };

    let outcome = pool.shutdown(args.shutdown_timeout()).await;
    if outcome.aborted > 0 {
        warn!(aborted = outcome.aborted, "some probe workers had to be aborted");
    }

    reporter.report(heading, &registry);

    Ok(())
}
