//! HTTP implementation of the provider interface against the public
//! speedtest.net surface: XML configuration for the client identity, the
//! JSON server catalog, and plain HTTP transfers for the measurements.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use log::debug;
use rand::RngCore;
use regex::Regex;
use reqwest::Client;

use super::{ClientInfo, ServerDescriptor, SpeedtestProvider};
use crate::utils::{measure_time, ProbeError, Result};

const CONFIG_URL: &str = "https://www.speedtest.net/speedtest-config.php";
const SERVERS_URL: &str = "https://www.speedtest.net/api/js/servers?engine=js&limit=1000";
const CLOSEST_URL: &str = "https://www.speedtest.net/api/js/servers?engine=js&limit=10";

/// Image sizes fetched for one download measurement.
const DOWNLOAD_SIZES: [u32; 3] = [350, 750, 1500];
const UPLOAD_CHUNK: usize = 64 * 1024;
const UPLOAD_CHUNKS: usize = 96;
const LATENCY_PROBES: usize = 3;
/// How many of the closest servers get latency-probed for `best_server`.
const BEST_CANDIDATES: usize = 5;

pub struct HttpProvider {
    client: Client,
}

impl HttpProvider {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("speedprobe/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_servers(&self, url: &str) -> Result<Vec<ServerDescriptor>> {
        let servers = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(servers)
    }

    fn measure_url(server: &ServerDescriptor, path: &str) -> String {
        format!("http://{}/speedtest/{}", server.host, path)
    }
}

#[async_trait]
impl SpeedtestProvider for HttpProvider {
    async fn config(&self) -> Result<ClientInfo> {
        let body = self
            .client
            .get(CONFIG_URL)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_client_info(&body)
    }

    async fn servers(&self) -> Result<Vec<ServerDescriptor>> {
        self.fetch_servers(SERVERS_URL).await
    }

    async fn closest_servers(&self) -> Result<Vec<ServerDescriptor>> {
        self.fetch_servers(CLOSEST_URL).await
    }

    async fn best_server(&self) -> Result<ServerDescriptor> {
        let closest = self.closest_servers().await?;
        let mut best: Option<(f64, ServerDescriptor)> = None;
        for server in closest.into_iter().take(BEST_CANDIDATES) {
            match self.latency(&server).await {
                Ok(ms) => {
                    if best.as_ref().map_or(true, |(best_ms, _)| ms < *best_ms) {
                        best = Some((ms, server));
                    }
                }
                Err(err) => debug!("latency probe against {} failed: {err}", server.host),
            }
        }
        best.map(|(_, server)| server).ok_or_else(|| {
            ProbeError::Provider("no reachable server among the closest candidates".into())
        })
    }

    async fn latency(&self, server: &ServerDescriptor) -> Result<f64> {
        let url = Self::measure_url(server, "latency.txt");
        let mut best = f64::INFINITY;
        for _ in 0..LATENCY_PROBES {
            let (elapsed, outcome) = measure_time(|| async {
                self.client.get(&url).send().await?.bytes().await?;
                Ok::<_, ProbeError>(())
            })
            .await;
            outcome?;
            best = best.min(elapsed.as_secs_f64() * 1000.0);
        }
        Ok(best)
    }

    async fn download(&self, server: &ServerDescriptor) -> Result<f64> {
        let (elapsed, fetched) = measure_time(|| async {
            let mut total_bytes = 0u64;
            for size in DOWNLOAD_SIZES {
                let url = Self::measure_url(server, &format!("random{size}x{size}.jpg"));
                let body = self
                    .client
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await?;
                total_bytes += body.len() as u64;
            }
            Ok::<_, ProbeError>(total_bytes)
        })
        .await;
        let total_bytes = fetched?;
        Ok(total_bytes as f64 * 8.0 / elapsed.as_secs_f64())
    }

    async fn upload(&self, server: &ServerDescriptor) -> Result<f64> {
        // One random chunk, repeated through a streaming body. The full
        // payload never exists in memory at once.
        let mut chunk = vec![0u8; UPLOAD_CHUNK];
        rand::thread_rng().fill_bytes(&mut chunk);
        let chunk = Bytes::from(chunk);
        let body =
            stream::iter((0..UPLOAD_CHUNKS).map(move |_| Ok::<Bytes, std::io::Error>(chunk.clone())));
        let total_bytes = (UPLOAD_CHUNK * UPLOAD_CHUNKS) as u64;

        let url = format!("http://{}/speedtest/upload.php", server.host);
        let (elapsed, outcome) = measure_time(|| async {
            self.client
                .post(&url)
                .body(reqwest::Body::wrap_stream(body))
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, ProbeError>(())
        })
        .await;
        outcome?;
        Ok(total_bytes as f64 * 8.0 / elapsed.as_secs_f64())
    }
}

/// Pulls ip/isp/country off the `<client>` element of the configuration
/// document. Three attributes do not justify an XML dependency.
fn parse_client_info(config_xml: &str) -> Result<ClientInfo> {
    let client_tag = Regex::new(r"<client [^>]*>")
        .expect("static regex")
        .find(config_xml)
        .ok_or_else(|| ProbeError::Provider("configuration has no client element".into()))?
        .as_str()
        .to_string();

    let attr = |name: &str| -> Result<String> {
        Regex::new(&format!(r#"\b{name}="([^"]*)""#))
            .expect("static regex")
            .captures(&client_tag)
            .map(|captures| captures[1].to_string())
            .ok_or_else(|| {
                ProbeError::Provider(format!("configuration client element lacks {name}"))
            })
    };

    Ok(ClientInfo {
        ip: attr("ip")?,
        isp: attr("isp")?,
        country: attr("country")?,
    })
}
