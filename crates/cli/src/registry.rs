//! Registry search clients.
//!
//! Registries are plain HTTP services returning normalized search hits
//! and resolved package descriptors. The traits keep the network out of
//! the command handlers; tests substitute in-memory clients.

use anyhow::Context;
use corral_state::RegistryEntry;
use serde::Deserialize;
use std::time::Duration;

use crate::Result;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// One normalized search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// A resolved package: where to fetch it from.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    /// Git source or tarball URL.
    pub source: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Search and resolution against one registry endpoint.
pub trait RegistryClient {
    fn search(&self, registry: &RegistryEntry, query: &str) -> Result<Vec<SearchHit>>;
    fn resolve(&self, registry: &RegistryEntry, name: &str) -> Result<PackageDescriptor>;
}

/// The real HTTP client.
#[derive(Debug, Default)]
pub struct HttpRegistryClient;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl HttpRegistryClient {
    fn client(&self, registry: &RegistryEntry) -> Result<reqwest::blocking::Client> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = &registry.api_key {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {key}"))
                .context("registry api key is not a valid header value")?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent("corral")
            .default_headers(headers)
            .build()
            .map_err(Into::into)
    }
}

impl RegistryClient for HttpRegistryClient {
    fn search(&self, registry: &RegistryEntry, query: &str) -> Result<Vec<SearchHit>> {
        let response: SearchResponse = self
            .client(registry)?
            .get(format!("{}/search", registry.url.trim_end_matches('/')))
            .query(&[("q", query)])
            .send()
            .context("registry search request failed")?
            .error_for_status()
            .context("registry search rejected")?
            .json()
            .context("registry search returned malformed JSON")?;
        Ok(response.results)
    }

    fn resolve(&self, registry: &RegistryEntry, name: &str) -> Result<PackageDescriptor> {
        self.client(registry)?
            .get(format!(
                "{}/packages/{name}",
                registry.url.trim_end_matches('/')
            ))
            .send()
            .context("registry resolve request failed")?
            .error_for_status()
            .context("registry resolve rejected")?
            .json()
            .context("registry resolve returned malformed JSON")
    }
}
