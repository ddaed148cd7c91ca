//! Report aggregation: pools every phase's results into one overall
//! upload/download summary and feeds pluggable sinks (console, HTML).

use chrono::{DateTime, Local};

use crate::icmp::{IcmpCampaignResult, IcmpStats};
use crate::orchestrator::ResultSet;
use crate::probe::ProbeResult;
use crate::provider::ClientInfo;
use crate::utils::{format_duration, mean, median, round2, Result};

pub mod console;
pub mod html;

pub use console::ConsoleSink;
pub use html::HtmlSink;

const MBIT_FACTOR: f64 = 1e-6;

pub const PHASE_COLUMNS: [&str; 6] = [
    "Country",
    "Location",
    "Sponsor",
    "Ping ms",
    "Upload Mbps",
    "Download Mbps",
];

/// Max/mean/median/min over one pooled speed sample, in Mbps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSummary {
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
}

impl SpeedSummary {
    fn over(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        Some(Self {
            max: round2(samples.iter().cloned().fold(f64::MIN, f64::max)),
            mean: round2(mean(samples)),
            median: round2(median(samples)),
            min: round2(samples.iter().cloned().fold(f64::MAX, f64::min)),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OverallSummary {
    pub upload: Option<SpeedSummary>,
    pub download: Option<SpeedSummary>,
}

/// Pools every phase's upload and download figures together; there are no
/// per-phase summaries. Each sample is converted to Mbps and rounded
/// before aggregation, so the summary matches the per-row figures.
pub fn summarize(results: &ResultSet) -> OverallSummary {
    let uploads: Vec<f64> = results
        .iter()
        .flat_map(|(_, probes)| probes)
        .map(|probe| round2(probe.upload_bps * MBIT_FACTOR))
        .collect();
    let downloads: Vec<f64> = results
        .iter()
        .flat_map(|(_, probes)| probes)
        .map(|probe| round2(probe.download_bps * MBIT_FACTOR))
        .collect();
    OverallSummary {
        upload: SpeedSummary::over(&uploads),
        download: SpeedSummary::over(&downloads),
    }
}

/// The ICMP section of a report. `stats` is `None` when the campaign
/// received nothing, in which case only the loss counters are shown.
#[derive(Debug, Clone)]
pub struct IcmpReport {
    pub node: String,
    pub packet_size: usize,
    pub campaign: IcmpCampaignResult,
    pub stats: Option<IcmpStats>,
}

/// Everything one run produced, handed to each sink as-is.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub client: ClientInfo,
    pub icmp: Option<IcmpReport>,
    pub results: ResultSet,
    pub overall: OverallSummary,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

pub trait ReportSink {
    fn render(&mut self, report: &RunReport) -> Result<()>;
}

pub(crate) fn phase_rows(results: &[ProbeResult]) -> Vec<[String; 6]> {
    results
        .iter()
        .map(|probe| {
            [
                probe.server.country.clone(),
                probe.server.location.clone(),
                probe.server.sponsor.clone(),
                format!("{:.2}", probe.ping_ms),
                format!("{:.2}", round2(probe.upload_bps * MBIT_FACTOR)),
                format!("{:.2}", round2(probe.download_bps * MBIT_FACTOR)),
            ]
        })
        .collect()
}

pub(crate) fn icmp_rows(icmp: &IcmpReport) -> Vec<(String, String)> {
    let mut rows = vec![
        ("Provider node".into(), icmp.node.clone()),
        ("Packet size (bytes)".into(), icmp.packet_size.to_string()),
        ("Total packets sent".into(), icmp.campaign.sent.to_string()),
        (
            "Packets received".into(),
            icmp.campaign.rtts_ms.len().to_string(),
        ),
        ("Packets lost".into(), icmp.campaign.lost.to_string()),
    ];
    match &icmp.stats {
        Some(stats) => {
            rows.push(("Packets lost (%)".into(), format!("{:.2}", stats.loss_pct)));
            rows.push((
                "Packets received (%)".into(),
                format!("{:.2}", round2(100.0 - stats.loss_pct)),
            ));
            rows.push(("Max value (ms)".into(), format!("{:.2}", stats.max_ms)));
            rows.push(("Average value (ms)".into(), format!("{:.2}", stats.mean_ms)));
            rows.push(("Median value (ms)".into(), format!("{:.2}", stats.median_ms)));
            rows.push(("Min value (ms)".into(), format!("{:.2}", stats.min_ms)));
            rows.push(("Jitter (ms)".into(), format!("{:.2}", stats.jitter_ms)));
        }
        None => {
            rows.push((
                "Latency statistics".into(),
                "undefined (no echo replies received)".into(),
            ));
        }
    }
    rows
}

pub(crate) fn overall_rows(report: &RunReport) -> Vec<(String, String)> {
    let duration = report.finished_at - report.started_at;
    let mut rows = vec![
        (
            "Start time".into(),
            report.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
        (
            "End time".into(),
            report.finished_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
        (
            "Test duration".into(),
            format_duration(duration.to_std().unwrap_or_default()),
        ),
        ("Your IP".into(), report.client.ip.clone()),
        ("Your Provider".into(), report.client.isp.clone()),
        ("Your Country".into(), report.client.country.clone()),
    ];
    let speed_rows = |label: &str, summary: &Option<SpeedSummary>| -> Vec<(String, String)> {
        match summary {
            Some(s) => vec![
                (format!("{label} speed max value (Mbps)"), format!("{:.2}", s.max)),
                (format!("{label} speed average value (Mbps)"), format!("{:.2}", s.mean)),
                (format!("{label} speed median value (Mbps)"), format!("{:.2}", s.median)),
                (format!("{label} speed min value (Mbps)"), format!("{:.2}", s.min)),
            ],
            None => vec![(format!("{label} speed"), "no successful tests".into())],
        }
    };
    rows.extend(speed_rows("Upload", &report.overall.upload));
    rows.extend(speed_rows("Download", &report.overall.download));
    rows
}
