//! Server catalog: partitions the provider's server list into local and
//! worldwide halves and reduces the closest-servers list to one
//! representative per country.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use rand::Rng;

use crate::provider::{ServerId, SpeedtestProvider};
use crate::utils::{ProbeError, Result};

pub struct ServerCatalog {
    provider: Arc<dyn SpeedtestProvider>,
}

/// The full catalog split by the user's country. The two halves are
/// disjoint and together cover every server; provider order is preserved
/// within each.
#[derive(Debug, Default)]
pub struct CatalogPartition {
    pub local: Vec<ServerId>,
    pub worldwide: Vec<ServerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Closest,
    Middle,
    Farthest,
}

impl ServerCatalog {
    pub fn new(provider: Arc<dyn SpeedtestProvider>) -> Self {
        Self { provider }
    }

    /// A server is local when either its country code or its country name
    /// matches the detected user country (the provider uses both forms).
    pub async fn fetch_catalog(&self, user_country: &str) -> Result<CatalogPartition> {
        let servers = self
            .provider
            .servers()
            .await
            .map_err(|err| ProbeError::CatalogUnavailable(err.to_string()))?;

        let mut partition = CatalogPartition::default();
        for server in servers {
            if server.cc == user_country || server.country == user_country {
                partition.local.push(server.id);
            } else {
                partition.worldwide.push(server.id);
            }
        }
        debug!(
            "catalog partitioned: {} local, {} worldwide",
            partition.local.len(),
            partition.worldwide.len()
        );
        Ok(partition)
    }

    /// One server per distinct country code among the closest servers,
    /// picked uniformly at random within each country's candidates. Keeps
    /// the battery from drowning in near-duplicate nearby servers while
    /// still sampling international diversity. Output order follows map
    /// iteration and is not meaningful.
    pub async fn select_closest_per_country<R: Rng>(&self, rng: &mut R) -> Result<Vec<ServerId>> {
        let closest = self
            .provider
            .closest_servers()
            .await
            .map_err(|err| ProbeError::CatalogUnavailable(err.to_string()))?;

        let mut by_country: HashMap<&str, Vec<ServerId>> = HashMap::new();
        for server in &closest {
            by_country.entry(&server.cc).or_default().push(server.id);
        }

        let mut selected = Vec::with_capacity(by_country.len());
        for (cc, candidates) in by_country {
            let pick = candidates[rng.gen_range(0..candidates.len())];
            debug!("country {cc}: picked server {pick} of {}", candidates.len());
            selected.push(pick);
        }
        Ok(selected)
    }
}

/// The `ratio`-sized sample a tier takes from an ordered id sequence:
/// the first `ratio` ids, a `ratio`-length slice from the midpoint, or the
/// last `ratio` ids. Bounds clamp, so tiers overlap when the sequence is
/// shorter than `3 * ratio`; that overlap is accepted, not special-cased.
pub fn tier_slice(ids: &[ServerId], tier: Tier, ratio: usize) -> Vec<ServerId> {
    let len = ids.len();
    let (start, end) = match tier {
        Tier::Closest => (0, ratio.min(len)),
        Tier::Middle => {
            let mid = len / 2;
            (mid, (mid + ratio).min(len))
        }
        Tier::Farthest => (len.saturating_sub(ratio), len),
    };
    ids[start..end].to_vec()
}
