//! Console rendering of a finished run: one aligned table per phase plus
//! the ICMP and overall sections.

use colored::*;

use super::{icmp_rows, overall_rows, phase_rows, ReportSink, RunReport, PHASE_COLUMNS};
use crate::utils::Result;

pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }

    fn print_title(title: &str) {
        println!();
        println!("{}", "=".repeat(80).blue());
        println!("{}", title.bold().blue());
        println!("{}", "=".repeat(80).blue());
    }

    fn print_key_value_table(title: &str, rows: &[(String, String)]) {
        Self::print_title(title);
        for (key, value) in rows {
            println!("{:<36} {}", key, value.cyan());
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSink for ConsoleSink {
    fn render(&mut self, report: &RunReport) -> Result<()> {
        if let Some(icmp) = &report.icmp {
            Self::print_key_value_table("ICMP tests", &icmp_rows(icmp));
        }

        for (phase, probes) in &report.results {
            Self::print_title(phase.as_str());
            println!(
                "{:<16} {:<20} {:<24} {:>8} {:>12} {:>14}",
                PHASE_COLUMNS[0],
                PHASE_COLUMNS[1],
                PHASE_COLUMNS[2],
                PHASE_COLUMNS[3],
                PHASE_COLUMNS[4],
                PHASE_COLUMNS[5],
            );
            println!("{}", "-".repeat(80).blue());
            let rows = phase_rows(probes);
            if rows.is_empty() {
                println!("{}", "no successful tests in this phase".yellow());
            }
            for row in rows {
                println!(
                    "{:<16} {:<20} {:<24} {:>8} {:>12} {:>14}",
                    row[0], row[1], row[2], row[3], row[4], row[5],
                );
            }
        }

        Self::print_key_value_table("Overall results", &overall_rows(report));
        println!();
        Ok(())
    }
}
