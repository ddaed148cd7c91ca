//! Probe client: one bandwidth test against one server, with per-test
//! failure isolation. A bad server is logged and skipped; it must never
//! take a multi-phase battery down with it.

use std::collections::HashMap;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use tokio::sync::OnceCell;

use crate::provider::{ServerDescriptor, ServerId, SpeedtestProvider};
use crate::utils::{ProbeError, Result};

/// One bandwidth test's outcome. Immutable once produced.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub server: ServerDescriptor,
    pub ping_ms: f64,
    pub upload_bps: f64,
    pub download_bps: f64,
}

pub struct ProbeClient {
    provider: Arc<dyn SpeedtestProvider>,
    // Full catalog keyed by id, fetched once on first lookup.
    directory: OnceCell<HashMap<ServerId, ServerDescriptor>>,
}

impl ProbeClient {
    pub fn new(provider: Arc<dyn SpeedtestProvider>) -> Self {
        Self {
            provider,
            directory: OnceCell::new(),
        }
    }

    async fn lookup(&self, id: ServerId) -> Result<ServerDescriptor> {
        let directory = self
            .directory
            .get_or_try_init(|| async {
                let servers = self.provider.servers().await?;
                Ok::<_, ProbeError>(
                    servers
                        .into_iter()
                        .map(|server| (server.id, server))
                        .collect(),
                )
            })
            .await?;
        directory
            .get(&id)
            .cloned()
            .ok_or(ProbeError::NoMatchedServer(id))
    }

    /// Latency, then one download, then one upload against the given
    /// descriptor. Strictly sequential so the transfers do not disturb
    /// each other's measurement.
    pub async fn measure_server(&self, server: &ServerDescriptor) -> Result<ProbeResult> {
        let ping_ms = self.provider.latency(server).await?;
        let download_bps = self.provider.download(server).await?;
        let upload_bps = self.provider.upload(server).await?;
        Ok(ProbeResult {
            server: server.clone(),
            ping_ms,
            upload_bps,
            download_bps,
        })
    }

    pub async fn run_bandwidth_test(&self, id: ServerId) -> Result<ProbeResult> {
        let server = self.lookup(id).await?;
        self.measure_server(&server).await
    }

    /// Runs every id in order, skipping failures. Progress ticks after each
    /// attempt, successful or not.
    pub async fn run_batch(&self, ids: &[ServerId]) -> Vec<ProbeResult> {
        let bar = ProgressBar::new(ids.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .expect("static progress template")
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );

        let mut results = Vec::new();
        for &id in ids {
            bar.set_message(format!("server {id}"));
            match self.run_bandwidth_test(id).await {
                Ok(result) => results.push(result),
                Err(err) => warn!("skipping server {id}: {err}"),
            }
            bar.inc(1);
        }
        bar.finish_and_clear();
        results
    }
}
