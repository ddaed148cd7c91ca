//! Narrow interface to the external speed-test provider.
//!
//! The bandwidth-measurement protocol itself is the provider's business;
//! everything this crate needs from it fits in [`SpeedtestProvider`]. The
//! orchestrator and catalog only ever talk to the trait, which is what lets
//! the whole battery run against a scripted provider in tests.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::utils::Result;

pub mod http;

pub use http::HttpProvider;

pub type ServerId = u32;

/// One remote test server as described by the provider catalog.
/// Immutable; never touched after deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerDescriptor {
    #[serde(deserialize_with = "de_server_id")]
    pub id: ServerId,
    pub cc: String,
    pub country: String,
    /// City/location string; the provider calls this field "name".
    #[serde(rename = "name")]
    pub location: String,
    pub sponsor: String,
    pub host: String,
}

/// The operator's public identity as the provider sees it.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: String,
    pub isp: String,
    pub country: String,
}

#[async_trait]
pub trait SpeedtestProvider: Send + Sync {
    /// Provider configuration, reduced to the client identity fields.
    async fn config(&self) -> Result<ClientInfo>;

    /// The full server catalog, in provider-defined order.
    async fn servers(&self) -> Result<Vec<ServerDescriptor>>;

    /// Servers nearest to the client, ordered by distance.
    async fn closest_servers(&self) -> Result<Vec<ServerDescriptor>>;

    /// The provider's recommended (lowest-latency) server.
    async fn best_server(&self) -> Result<ServerDescriptor>;

    /// Round-trip latency to one server, in milliseconds.
    async fn latency(&self, server: &ServerDescriptor) -> Result<f64>;

    /// One download measurement, in bits per second.
    async fn download(&self, server: &ServerDescriptor) -> Result<f64>;

    /// One upload measurement, in bits per second. Implementations must
    /// produce the payload incrementally, not as one pre-allocated buffer.
    async fn upload(&self, server: &ServerDescriptor) -> Result<f64>;
}

// The JSON catalog serializes ids as strings, older payloads as numbers.
fn de_server_id<'de, D>(deserializer: D) -> std::result::Result<ServerId, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Num(u32),
        Text(String),
    }

    match IdRepr::deserialize(deserializer)? {
        IdRepr::Num(id) => Ok(id),
        IdRepr::Text(text) => text.parse().map_err(D::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_accepts_string_and_numeric_ids() {
        let json = r#"{"id":"1234","cc":"DE","country":"Germany","name":"Berlin","sponsor":"Acme","host":"b.example.net:8080"}"#;
        let server: ServerDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(server.id, 1234);
        assert_eq!(server.location, "Berlin");

        let json = r#"{"id":42,"cc":"FR","country":"France","name":"Paris","sponsor":"Acme","host":"p.example.net:8080"}"#;
        let server: ServerDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(server.id, 42);
    }
}
