use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;

use speedprobe::catalog::ServerCatalog;
use speedprobe::orchestrator::{Phase, TestOrchestrator};
use speedprobe::probe::ProbeClient;
use speedprobe::provider::{ClientInfo, ServerDescriptor, ServerId, SpeedtestProvider};
use speedprobe::utils::{ProbeError, Result};

fn server(id: ServerId, cc: &str, country: &str) -> ServerDescriptor {
    ServerDescriptor {
        id,
        cc: cc.to_string(),
        country: country.to_string(),
        location: format!("city-{id}"),
        sponsor: format!("sponsor-{id}"),
        host: format!("srv{id}.example.net:8080"),
    }
}

/// Scripted provider: fixed catalog, fixed closest list, and a set of
/// server ids whose measurements fail.
struct MockProvider {
    servers: Vec<ServerDescriptor>,
    closest: Vec<ServerDescriptor>,
    failing: HashSet<ServerId>,
}

impl MockProvider {
    fn new() -> Self {
        let mut servers: Vec<ServerDescriptor> =
            (1..=10).map(|id| server(id, "DE", "Germany")).collect();
        servers.extend([
            server(11, "FR", "France"),
            server(12, "FR", "France"),
            server(13, "US", "United States"),
            server(14, "US", "United States"),
            server(15, "US", "United States"),
            server(16, "CZ", "Czechia"),
            server(17, "JP", "Japan"),
            server(18, "BR", "Brazil"),
            server(19, "BR", "Brazil"),
            server(20, "BR", "Brazil"),
        ]);
        let closest = vec![
            server(1, "DE", "Germany"),
            server(2, "DE", "Germany"),
            server(11, "FR", "France"),
            server(12, "FR", "France"),
            server(16, "CZ", "Czechia"),
        ];
        Self {
            servers,
            closest,
            failing: HashSet::new(),
        }
    }

    fn with_failing(mut self, ids: &[ServerId]) -> Self {
        self.failing = ids.iter().copied().collect();
        self
    }
}

#[async_trait]
impl SpeedtestProvider for MockProvider {
    async fn config(&self) -> Result<ClientInfo> {
        Ok(ClientInfo {
            ip: "203.0.113.7".into(),
            isp: "Example Telecom".into(),
            country: "Germany".into(),
        })
    }

    async fn servers(&self) -> Result<Vec<ServerDescriptor>> {
        Ok(self.servers.clone())
    }

    async fn closest_servers(&self) -> Result<Vec<ServerDescriptor>> {
        Ok(self.closest.clone())
    }

    async fn best_server(&self) -> Result<ServerDescriptor> {
        self.closest
            .first()
            .cloned()
            .ok_or_else(|| ProbeError::Provider("no closest servers".into()))
    }

    async fn latency(&self, server: &ServerDescriptor) -> Result<f64> {
        if self.failing.contains(&server.id) {
            return Err(ProbeError::Provider(format!("server {} is down", server.id)));
        }
        Ok(10.0 + server.id as f64)
    }

    async fn download(&self, server: &ServerDescriptor) -> Result<f64> {
        Ok(server.id as f64 * 1_000_000.0)
    }

    async fn upload(&self, server: &ServerDescriptor) -> Result<f64> {
        Ok(server.id as f64 * 500_000.0)
    }
}

#[tokio::test]
async fn catalog_partition_is_disjoint_and_covering() {
    let provider = Arc::new(MockProvider::new());
    let catalog = ServerCatalog::new(provider.clone());

    let partition = catalog.fetch_catalog("Germany").await.unwrap();

    let local: HashSet<ServerId> = partition.local.iter().copied().collect();
    let worldwide: HashSet<ServerId> = partition.worldwide.iter().copied().collect();
    assert!(local.is_disjoint(&worldwide));

    let all: HashSet<ServerId> = provider.servers.iter().map(|s| s.id).collect();
    let both: HashSet<ServerId> = local.union(&worldwide).copied().collect();
    assert_eq!(both, all);

    // Every id landed on the side its partition predicate says.
    for server in &provider.servers {
        let is_local = server.cc == "Germany" || server.country == "Germany";
        assert_eq!(local.contains(&server.id), is_local);
    }
}

#[tokio::test]
async fn catalog_partition_preserves_provider_order() {
    let provider = Arc::new(MockProvider::new());
    let catalog = ServerCatalog::new(provider);

    let partition = catalog.fetch_catalog("Germany").await.unwrap();
    assert_eq!(partition.local, (1..=10).collect::<Vec<_>>());
    assert_eq!(partition.worldwide, (11..=20).collect::<Vec<_>>());
}

#[tokio::test]
async fn closest_selection_is_one_per_country_from_the_response() {
    let provider = Arc::new(MockProvider::new());
    let catalog = ServerCatalog::new(provider.clone());
    let mut rng = StdRng::seed_from_u64(7);

    let selected = catalog.select_closest_per_country(&mut rng).await.unwrap();

    // One id per distinct country code, order not asserted.
    assert_eq!(selected.len(), 3);

    let by_id: HashMap<ServerId, &str> = provider
        .closest
        .iter()
        .map(|s| (s.id, s.cc.as_str()))
        .collect();
    let mut seen_countries = HashSet::new();
    for id in &selected {
        let cc = by_id.get(id).expect("selected id must come from the closest response");
        assert!(seen_countries.insert(*cc), "two picks from country {cc}");
    }
}

#[tokio::test]
async fn run_batch_skips_failing_servers_and_keeps_order() {
    let provider = Arc::new(MockProvider::new().with_failing(&[2, 4]));
    let probe = ProbeClient::new(provider);

    let results = probe.run_batch(&[1, 2, 3, 4, 5]).await;

    let ids: Vec<ServerId> = results.iter().map(|r| r.server.id).collect();
    assert_eq!(ids, vec![1, 3, 5]);
}

#[tokio::test]
async fn run_batch_skips_unknown_server_ids() {
    let provider = Arc::new(MockProvider::new());
    let probe = ProbeClient::new(provider);

    let results = probe.run_batch(&[1, 999, 3]).await;

    let ids: Vec<ServerId> = results.iter().map(|r| r.server.id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test]
async fn battery_runs_every_phase_in_order() {
    let provider = Arc::new(MockProvider::new());
    let mut orchestrator =
        TestOrchestrator::with_rng(provider, 3, StdRng::seed_from_u64(7));

    let results = orchestrator.run_battery("Germany").await.unwrap();

    let phases: Vec<Phase> = results.iter().map(|(phase, _)| *phase).collect();
    assert_eq!(
        phases,
        vec![
            Phase::BestServer,
            Phase::ClosestServers,
            Phase::ClosestLocalServers,
            Phase::MiddleLocalServers,
            Phase::FarthestLocalServers,
            Phase::ClosestWorldwideServers,
            Phase::MiddleWorldwideServers,
            Phase::FarthestWorldwideServers,
        ]
    );

    assert_eq!(results[0].1.len(), 1, "best server phase is a single test");
    assert_eq!(results[1].1.len(), 3, "one closest test per country");
    for (phase, probes) in &results[2..] {
        assert_eq!(probes.len(), 3, "{phase} should sample a full tier");
    }

    // Local tiers draw from German servers only.
    for (_, probes) in &results[2..5] {
        assert!(probes.iter().all(|r| r.server.cc == "DE"));
    }
    for (_, probes) in &results[5..] {
        assert!(probes.iter().all(|r| r.server.cc != "DE"));
    }
}

#[tokio::test]
async fn best_server_failure_leaves_an_empty_phase_and_continues() {
    // Server 1 is the scripted best server; its failure must not stop the
    // rest of the battery.
    let provider = Arc::new(MockProvider::new().with_failing(&[1]));
    let mut orchestrator =
        TestOrchestrator::with_rng(provider, 2, StdRng::seed_from_u64(1));

    let results = orchestrator.run_battery("Germany").await.unwrap();

    assert_eq!(results.len(), 8);
    assert_eq!(results[0].0, Phase::BestServer);
    assert!(results[0].1.is_empty());
    assert!(results[1..].iter().any(|(_, probes)| !probes.is_empty()));
}

#[tokio::test]
async fn battery_pools_into_an_overall_summary() {
    let provider = Arc::new(MockProvider::new());
    let mut orchestrator =
        TestOrchestrator::with_rng(provider, 3, StdRng::seed_from_u64(7));

    let results = orchestrator.run_battery("Germany").await.unwrap();
    let overall = speedprobe::report::summarize(&results);

    let upload = overall.upload.expect("successful tests produce a summary");
    let download = overall.download.expect("successful tests produce a summary");
    assert!(upload.min <= upload.median && upload.median <= upload.max);
    assert!(download.min <= download.median && download.median <= download.max);
    // Mock speeds: download = id Mbps, upload = id/2 Mbps.
    assert_eq!(download.max, 2.0 * upload.max);
}
