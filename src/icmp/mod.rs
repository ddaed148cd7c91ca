//! ICMP latency prober: a fixed-count echo campaign against one node,
//! strictly one packet in flight at a time.
//!
//! Raw ICMP sockets need elevated privileges; the permission error
//! surfaces when the socket opens, before any campaign work starts.

use std::net::IpAddr;
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use rand::random;
use surge_ping::{Client, Config, PingIdentifier, PingSequence};

use crate::utils::{mean, median, round2, ProbeError, Result};

/// Payload ceiling carried over from the provider node policy. Larger
/// values are rejected outright, never clamped.
pub const MAX_PACKET_SIZE: usize = 996;

const ECHO_TIMEOUT: Duration = Duration::from_secs(2);

/// Rejects payload sizes above [`MAX_PACKET_SIZE`]. Checked before any
/// socket or campaign work so an oversized request never reaches the wire.
pub fn validate_packet_size(packet_size: usize) -> Result<()> {
    if packet_size > MAX_PACKET_SIZE {
        return Err(ProbeError::PacketSizeTooLarge(packet_size));
    }
    Ok(())
}

pub struct IcmpProber {
    client: Client,
}

/// Raw outcome of one campaign, built incrementally while it runs.
/// Lost packets are counted but contribute no latency sample.
#[derive(Debug, Clone, Default)]
pub struct IcmpCampaignResult {
    pub sent: u32,
    pub lost: u32,
    pub rtts_ms: Vec<f64>,
}

/// Statistics derived from a finished campaign, all rounded to two
/// decimal places.
#[derive(Debug, Clone)]
pub struct IcmpStats {
    pub received: u32,
    pub lost: u32,
    pub loss_pct: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub min_ms: f64,
    /// Max minus min over the received round-trip times.
    pub jitter_ms: f64,
}

impl IcmpProber {
    pub fn new() -> Result<Self> {
        let client = Client::new(&Config::default()).map_err(|err| {
            if err.kind() == std::io::ErrorKind::PermissionDenied {
                ProbeError::PermissionDenied
            } else {
                ProbeError::Io(err)
            }
        })?;
        Ok(Self { client })
    }

    /// One-shot reachability check before committing to a long campaign.
    pub async fn resolve(&self, node: &str) -> Result<IpAddr> {
        let addr = resolve_host(node).await?;
        let mut pinger = self.client.pinger(addr, PingIdentifier(random())).await;
        pinger.timeout(ECHO_TIMEOUT);
        pinger
            .ping(PingSequence(0), &[0u8; 56])
            .await
            .map_err(|_| ProbeError::UnresolvableNode(node.to_string()))?;
        Ok(addr)
    }

    /// Sends exactly `count` echoes of `packet_size` payload bytes, each
    /// awaited before the next goes out. `count == 0` is a valid (empty)
    /// campaign.
    pub async fn run_campaign(
        &self,
        addr: IpAddr,
        count: u32,
        packet_size: usize,
    ) -> Result<IcmpCampaignResult> {
        validate_packet_size(packet_size)?;

        let payload = vec![0u8; packet_size];
        let mut pinger = self.client.pinger(addr, PingIdentifier(random())).await;
        pinger.timeout(ECHO_TIMEOUT);

        let bar = ProgressBar::new(count as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len}")
                .expect("static progress template")
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );

        let mut campaign = IcmpCampaignResult::default();
        for seq in 0..count {
            // Sequence numbers are 16-bit on the wire; with one echo in
            // flight the wrap-around is unambiguous.
            match pinger
                .ping(PingSequence((seq % u16::MAX as u32) as u16), &payload)
                .await
            {
                Ok((_, rtt)) => campaign.rtts_ms.push(rtt.as_secs_f64() * 1000.0),
                Err(err) => {
                    debug!("echo {seq} lost: {err}");
                    campaign.lost += 1;
                }
            }
            campaign.sent += 1;
            bar.inc(1);
        }
        bar.finish_and_clear();
        Ok(campaign)
    }
}

impl IcmpStats {
    /// A campaign with zero received replies has no defined latency
    /// statistics; that is `NoSamples`, reported to the operator rather
    /// than an arithmetic failure.
    pub fn from_campaign(campaign: &IcmpCampaignResult) -> Result<Self> {
        if campaign.rtts_ms.is_empty() {
            return Err(ProbeError::NoSamples);
        }
        let max = campaign.rtts_ms.iter().cloned().fold(f64::MIN, f64::max);
        let min = campaign.rtts_ms.iter().cloned().fold(f64::MAX, f64::min);
        let loss_pct = round2(campaign.lost as f64 * 100.0 / campaign.sent as f64);
        Ok(Self {
            received: campaign.rtts_ms.len() as u32,
            lost: campaign.lost,
            loss_pct,
            max_ms: round2(max),
            mean_ms: round2(mean(&campaign.rtts_ms)),
            median_ms: round2(median(&campaign.rtts_ms)),
            min_ms: round2(min),
            jitter_ms: round2(max - min),
        })
    }
}

async fn resolve_host(node: &str) -> Result<IpAddr> {
    if let Ok(ip) = node.parse::<IpAddr>() {
        return Ok(ip);
    }
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    let lookup = resolver
        .lookup_ip(node)
        .await
        .map_err(|err| ProbeError::UnresolvableNode(format!("{node}: {err}")))?;
    // The echo client speaks ICMPv4, so an A record wins when both exist.
    lookup
        .iter()
        .find(IpAddr::is_ipv4)
        .or_else(|| lookup.iter().next())
        .ok_or_else(|| ProbeError::UnresolvableNode(node.to_string()))
}
