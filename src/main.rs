use std::io::Write;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use colored::*;
use speedprobe::cli::Cli;
use speedprobe::icmp::{validate_packet_size, IcmpProber, IcmpStats};
use speedprobe::orchestrator::{check_connectivity, TestOrchestrator};
use speedprobe::provider::{HttpProvider, SpeedtestProvider};
use speedprobe::report::{ConsoleSink, HtmlSink, IcmpReport, ReportSink, RunReport};
use speedprobe::utils::{ProbeError, Result};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .init();

    // Every fatal condition ends the run with a plain message, not a
    // panic or a non-zero status.
    if let Err(err) = run(cli).await {
        println!("{}", err.to_string().red());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let started_at = Local::now();

    if cli.server_mode.is_none() {
        check_connectivity().await?;
    }

    let provider = Arc::new(HttpProvider::new()?);
    let client_info = provider.config().await?;

    println!();
    println!("{}", "speedprobe - Internet connection tests".bold().blue());
    println!("IP:       {}", client_info.ip.cyan());
    println!("Provider: {}", client_info.isp.cyan());
    println!("Country:  {}", client_info.country.cyan());
    println!();

    let mut icmp_report = None;
    if let Some(node) = &cli.node {
        // Rejected before any ICMP work, never clamped.
        validate_packet_size(cli.packet_size)?;

        let prober = IcmpProber::new()?;
        let addr = prober.resolve(node).await?;

        println!(
            "Running {} ICMP echoes of {} bytes against {node} ({addr}):",
            cli.number_of_tests, cli.packet_size
        );
        let campaign = prober
            .run_campaign(addr, cli.number_of_tests, cli.packet_size)
            .await?;

        let stats = match IcmpStats::from_campaign(&campaign) {
            Ok(stats) => Some(stats),
            Err(ProbeError::NoSamples) => {
                println!("{}", ProbeError::NoSamples.to_string().yellow());
                None
            }
            Err(err) => return Err(err),
        };
        icmp_report = Some(IcmpReport {
            node: node.clone(),
            packet_size: cli.packet_size,
            campaign,
            stats,
        });
    }

    let mut orchestrator = TestOrchestrator::new(provider, cli.ratio_of_global_tests);
    let results = orchestrator.run_battery(&client_info.country).await?;
    let overall = speedprobe::report::summarize(&results);

    let report = RunReport {
        client: client_info,
        icmp: icmp_report,
        results,
        overall,
        started_at,
        finished_at: Local::now(),
    };

    ConsoleSink::new().render(&report)?;

    if !cli.no_html {
        let mut sink = HtmlSink::timestamped();
        sink.render(&report)?;
        println!("Report written to {}", sink.path().display());
    }

    if !cli.no_wait {
        print!("Press [Enter] to exit");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
    }
    Ok(())
}
