//! Table-formatted output for CLI.

use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use fsa_probe_core::report::{RegistrySummary, ReportHeading};
use fsa_probe_core::types::DeviceSnapshot;

use super::OutputFormatter;

pub struct TableOutput;

impl TableOutput {
    pub fn new() -> Self {
        Self
    }

    fn heading_line(heading: ReportHeading) -> String {
        let title = format!(" {} ", heading);
        let line = format!("# {:-^76} #", title);
        match heading {
            ReportHeading::LossEvent(_) => line.yellow().to_string(),
            _ => line.bold().to_string(),
        }
    }

    fn device_table(devices: &[DeviceSnapshot]) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["IP", "Sent", "Lost", "Consecutive", "Loss /10k", "Loss %"]);

        for device in devices {
            let stats = &device.stats;
            let lost_cell = if stats.continuous_cnt > 0 {
                Cell::new(stats.timeout_cnt).fg(Color::Red)
            } else {
                Cell::new(stats.timeout_cnt)
            };

            table.add_row(vec![
                Cell::new(&device.ip),
                Cell::new(stats.all_cnt),
                lost_cell,
                Cell::new(stats.continuous_cnt),
                Cell::new(format!("{:.1}", stats.timeout_rate)),
                Cell::new(format!("{:.4}%", stats.loss_percent())),
            ]);
        }

        table
    }
}

impl Default for TableOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for TableOutput {
    fn format_report(&self, heading: ReportHeading, summary: &RegistrySummary) -> String {
        let mut lines = vec![Self::heading_line(heading)];

        if summary.is_empty() {
            lines.push("No FSA devices found, check that they are connected.".to_string());
            return lines.join("\n");
        }

        for (label, devices) in [("v2", &summary.v2), ("v3", &summary.v3)] {
            if devices.is_empty() {
                continue;
            }
            lines.push(format!("{} ({} device(s))", label.bold(), devices.len()));
            lines.push(Self::device_table(devices).to_string());
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsa_probe_core::registry::DeviceRegistry;
    use fsa_probe_core::types::ProtocolVersion;

    #[test]
    fn test_empty_registry_message() {
        let summary = RegistrySummary::collect(&DeviceRegistry::new());
        let output = TableOutput::new().format_report(ReportHeading::SearchResults, &summary);

        assert!(output.contains("search results"));
        assert!(output.contains("No FSA devices found"));
    }

    #[test]
    fn test_rows_show_counters() {
        let mut registry = DeviceRegistry::new();
        registry.insert("192.168.137.101".parse().unwrap(), ProtocolVersion::V3);
        registry.v3()[0].update(|s| {
            for i in 0..4 {
                s.record_sent();
                if i == 0 {
                    s.record_timeout();
                } else {
                    s.record_reply();
                }
            }
        });

        let summary = RegistrySummary::collect(&registry);
        let output = TableOutput::new().format_report(ReportHeading::Cancelled, &summary);

        assert!(output.contains("192.168.137.101"));
        assert!(output.contains("2500.0"));
        assert!(output.contains("25.0000%"));
        assert!(!output.contains("No FSA devices found"));
    }
}
