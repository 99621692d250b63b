//! JSON-lines output for CLI.
//!
//! Each report is one compact JSON object so a long monitor run can be piped
//! into line-oriented tools.

use serde_json::json;

use fsa_probe_core::report::{RegistrySummary, ReportHeading};

use super::OutputFormatter;

pub struct JsonOutput;

impl JsonOutput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for JsonOutput {
    fn format_report(&self, heading: ReportHeading, summary: &RegistrySummary) -> String {
        let event_ip = match heading {
            ReportHeading::LossEvent(ip) => Some(ip.to_string()),
            _ => None,
        };

        let output = json!({
            "event": heading.as_str(),
            "ip": event_ip,
            "report": summary,
        });
        serde_json::to_string(&output).unwrap_or_else(|_| "{}".to_string())
    }
}
