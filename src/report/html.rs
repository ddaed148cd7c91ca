//! HTML report file: one table per test phase plus the ICMP and overall
//! summary tables, written to the working directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use super::{icmp_rows, overall_rows, phase_rows, ReportSink, RunReport, PHASE_COLUMNS};
use crate::utils::Result;

pub struct HtmlSink {
    path: PathBuf,
}

impl HtmlSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The default `report_<timestamp>.html` in the working directory.
    pub fn timestamped() -> Self {
        let name = Local::now()
            .format("report_%Y-%m-%d_%H-%M-%S.html")
            .to_string();
        Self::new(PathBuf::from(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for HtmlSink {
    fn render(&mut self, report: &RunReport) -> Result<()> {
        fs::write(&self.path, render_document(report))?;
        Ok(())
    }
}

fn render_document(report: &RunReport) -> String {
    let mut html = String::from(
        "<html>\n<head>\n<meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\">\n\
         <title>speedprobe</title>\n</head>\n<body>\n\
         <center><h2>speedprobe - connection tests</h2></center><br>\n",
    );

    if let Some(icmp) = &report.icmp {
        html.push_str(&key_value_table("ICMP tests", &icmp_rows(icmp)));
    }

    for (phase, probes) in &report.results {
        let header: Vec<String> = PHASE_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut rows = vec![header];
        rows.extend(phase_rows(probes).into_iter().map(|row| row.to_vec()));
        html.push_str(&table(phase.as_str(), &rows));
    }

    let overall: Vec<Vec<String>> = std::iter::once(vec!["Specification".into(), "Results".into()])
        .chain(
            overall_rows(report)
                .into_iter()
                .map(|(key, value)| vec![key, value]),
        )
        .collect();
    html.push_str(&table("Overall results", &overall));

    html.push_str("</body></html>\n");
    html
}

fn key_value_table(title: &str, rows: &[(String, String)]) -> String {
    let data: Vec<Vec<String>> = std::iter::once(vec!["Specification".into(), "Results".into()])
        .chain(rows.iter().map(|(key, value)| vec![key.clone(), value.clone()]))
        .collect();
    table(title, &data)
}

fn table(title: &str, rows: &[Vec<String>]) -> String {
    let mut html = format!(
        "<table width=\"80%\" border=\"1\" align=\"center\"><caption><b>Report type: {}</b></caption>\n",
        escape(title)
    );
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str("<td>");
            html.push_str(&escape(cell));
            html.push_str("</td>");
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table><br><br>\n");
    html
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
