//! UDP discovery for FSA devices.
//!
//! Thin wrapper around core's broadcaster that shows a spinner while the
//! reply window is open.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use fsa_probe_core::discovery::{Broadcaster, DiscoveryConfig};
use fsa_probe_core::registry::DeviceRegistry;
use fsa_probe_core::report::{ReportHeading, Reporter};
use fsa_probe_core::CancellationToken;

use crate::error::CliError;

/// Clears the spinner before handing the report on.
struct SpinnerReporter<'a> {
    spinner: ProgressBar,
    inner: &'a dyn Reporter,
}

impl Reporter for SpinnerReporter<'_> {
    fn report(&self, heading: ReportHeading, registry: &DeviceRegistry) {
        self.spinner.finish_and_clear();
        self.inner.report(heading, registry);
    }
}

fn discovery_spinner(config: &DiscoveryConfig) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("Searching for FSA devices via {}", config.target()));
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Discover devices on the network.
///
/// Delegates to core's `Broadcaster`; `reporter` receives the search results.
pub async fn discover_devices(
    config: DiscoveryConfig,
    cancel: CancellationToken,
    reporter: &dyn Reporter,
) -> Result<DeviceRegistry, CliError> {
    let spinner_reporter = SpinnerReporter {
        spinner: discovery_spinner(&config),
        inner: reporter,
    };

    let mut registry = DeviceRegistry::new();
    let result = Broadcaster::new(config, cancel)
        .run(&mut registry, &spinner_reporter)
        .await;
    spinner_reporter.spinner.finish_and_clear();
    result?;

    Ok(registry)
}
