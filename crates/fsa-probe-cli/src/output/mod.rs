//! Output formatting for CLI reports.

pub mod json;
pub mod table;

pub use json::JsonOutput;
pub use table::TableOutput;

use fsa_probe_core::registry::DeviceRegistry;
use fsa_probe_core::report::{RegistrySummary, ReportHeading, Reporter};

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format a registry summary under a heading
    fn format_report(&self, heading: ReportHeading, summary: &RegistrySummary) -> String;
}

/// Get the appropriate formatter based on JSON flag
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonOutput::new())
    } else {
        Box::new(TableOutput::new())
    }
}

/// Reporter that prints formatted summaries to stdout.
pub struct ConsoleReporter {
    formatter: Box<dyn OutputFormatter>,
    quiet_loss: bool,
}

impl ConsoleReporter {
    pub fn new(formatter: Box<dyn OutputFormatter>, quiet_loss: bool) -> Self {
        Self {
            formatter,
            quiet_loss,
        }
    }

    /// Rendered report, or `None` when this heading is muted.
    pub fn render(&self, heading: ReportHeading, registry: &DeviceRegistry) -> Option<String> {
        if self.quiet_loss && matches!(heading, ReportHeading::LossEvent(_)) {
            tracing::debug!("{}", heading);
            return None;
        }

        let summary = RegistrySummary::collect(registry);
        Some(self.formatter.format_report(heading, &summary))
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, heading: ReportHeading, registry: &DeviceRegistry) {
        if let Some(output) = self.render(heading, registry) {
            // One println per report keeps concurrent workers from interleaving
            println!("{}", output);
        }
    }
}
