//! Test orchestrator: drives the whole battery in a fixed, linear order
//! and owns the append-only result set. Nothing here retries; a failed
//! probe is recorded as absent because transient variance is part of what
//! is being measured.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::catalog::{tier_slice, ServerCatalog, Tier};
use crate::probe::{ProbeClient, ProbeResult};
use crate::provider::SpeedtestProvider;
use crate::utils::{ProbeError, Result};

const CONNECTIVITY_PROBE_URL: &str = "http://google.com";

/// One named stage of the battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BestServer,
    ClosestServers,
    ClosestLocalServers,
    MiddleLocalServers,
    FarthestLocalServers,
    ClosestWorldwideServers,
    MiddleWorldwideServers,
    FarthestWorldwideServers,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::BestServer => "best_server",
            Phase::ClosestServers => "closest_servers",
            Phase::ClosestLocalServers => "closest_local_servers",
            Phase::MiddleLocalServers => "middle_local_servers",
            Phase::FarthestLocalServers => "farthest_local_servers",
            Phase::ClosestWorldwideServers => "closest_worldwide_servers",
            Phase::MiddleWorldwideServers => "middle_worldwide_servers",
            Phase::FarthestWorldwideServers => "farthest_worldwide_servers",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered phase-name-to-results mapping. Grows monotonically during a
/// run; only the orchestrator writes to it, strictly in phase order.
pub type ResultSet = Vec<(Phase, Vec<ProbeResult>)>;

/// A single reachability probe to a well-known host, run before any
/// measurement work. Only transport-level failures count; any HTTP status
/// (redirects included) proves connectivity.
pub async fn check_connectivity() -> Result<()> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(10))
        .build()?;
    client
        .get(CONNECTIVITY_PROBE_URL)
        .send()
        .await
        .map_err(|err| ProbeError::NoInternetConnectivity(err.to_string()))?;
    Ok(())
}

pub struct TestOrchestrator<R: Rng = StdRng> {
    provider: Arc<dyn SpeedtestProvider>,
    catalog: ServerCatalog,
    probe: ProbeClient,
    rng: R,
    ratio: usize,
}

impl TestOrchestrator<StdRng> {
    pub fn new(provider: Arc<dyn SpeedtestProvider>, ratio: usize) -> Self {
        Self::with_rng(provider, ratio, StdRng::from_entropy())
    }
}

impl<R: Rng> TestOrchestrator<R> {
    /// The randomness source is injected so the per-country selection can
    /// be made deterministic in tests.
    pub fn with_rng(provider: Arc<dyn SpeedtestProvider>, ratio: usize, rng: R) -> Self {
        Self {
            catalog: ServerCatalog::new(provider.clone()),
            probe: ProbeClient::new(provider.clone()),
            provider,
            rng,
            ratio,
        }
    }

    /// Runs the full battery: best server, closest-per-country, then the
    /// three local tiers and the three worldwide tiers. Catalog failures
    /// are fatal; individual server failures are contained per probe.
    pub async fn run_battery(&mut self, user_country: &str) -> Result<ResultSet> {
        let mut results: ResultSet = Vec::new();

        let best = self.provider.best_server().await?;
        println!(
            "Testing against the best server: {} ({}, {})",
            best.sponsor, best.location, best.country
        );
        match self.probe.measure_server(&best).await {
            Ok(result) => results.push((Phase::BestServer, vec![result])),
            Err(err) => {
                warn!("best server test failed: {err}");
                results.push((Phase::BestServer, Vec::new()));
            }
        }

        let closest = self.catalog.select_closest_per_country(&mut self.rng).await?;
        println!(
            "Testing against the closest servers, one per country ({} tests):",
            closest.len()
        );
        let closest_results = self.probe.run_batch(&closest).await;
        results.push((Phase::ClosestServers, closest_results));

        let partition = self.catalog.fetch_catalog(user_country).await?;

        println!(
            "Testing against local servers, three tiers of {}:",
            self.ratio
        );
        for (phase, tier) in [
            (Phase::ClosestLocalServers, Tier::Closest),
            (Phase::MiddleLocalServers, Tier::Middle),
            (Phase::FarthestLocalServers, Tier::Farthest),
        ] {
            let ids = tier_slice(&partition.local, tier, self.ratio);
            info!("{phase}: {} servers", ids.len());
            results.push((phase, self.probe.run_batch(&ids).await));
        }

        println!(
            "Testing against worldwide servers, three tiers of {}:",
            self.ratio
        );
        for (phase, tier) in [
            (Phase::ClosestWorldwideServers, Tier::Closest),
            (Phase::MiddleWorldwideServers, Tier::Middle),
            (Phase::FarthestWorldwideServers, Tier::Farthest),
        ] {
            let ids = tier_slice(&partition.worldwide, tier, self.ratio);
            info!("{phase}: {} servers", ids.len());
            results.push((phase, self.probe.run_batch(&ids).await));
        }

        Ok(results)
    }
}
