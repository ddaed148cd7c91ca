use std::time::{Duration, Instant};
use thiserror::Error;

use crate::provider::ServerId;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Cannot reach the connectivity probe host. Please check your Internet connection (including DNS) and try again. ({0})")]
    NoInternetConnectivity(String),
    #[error("Permission denied. ICMP tests need administrator (root) rights.")]
    PermissionDenied,
    #[error("Cannot resolve {0}. Please check the provider node and try again.")]
    UnresolvableNode(String),
    #[error("Packet sizes above 996 bytes are not supported; got {0}. Please try again.")]
    PacketSizeTooLarge(usize),
    #[error("Server catalog unavailable: {0}")]
    CatalogUnavailable(String),
    #[error("No server matches id {0}")]
    NoMatchedServer(ServerId),
    #[error("No echo replies received; latency statistics are undefined")]
    NoSamples,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Provider error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, ProbeError>;

/// Rounds to two decimal places, the precision every reported figure uses.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Arithmetic mean. Callers guard against empty samples.
pub fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Median over an unsorted sample. Callers guard against empty samples.
pub fn median(samples: &[f64]) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("latency samples are finite"));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.2}s", duration.as_secs_f32())
    }
}

pub async fn measure_time<F, Fut, T>(f: F) -> (Duration, T)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let result = f().await;
    let duration = start.elapsed();
    (duration, result)
}
