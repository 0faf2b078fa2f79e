// # DigitalOcean Compute Driver
//
// This crate lists the droplets of a DigitalOcean account for a
// DigitalOcean zone.
//
// ## API Reference
//
// - Endpoint: `GET {base}/{version}/droplets?page=N&per_page=200`
// - Auth: `Authorization: Bearer <token>`
// - Pagination: follow `links.pages.next` until it is absent; a link to any
//   other origin than the API base is refused, the token never leaves it
//
// Each droplet becomes an instance with its `name`, `vcpus` and `memory`
// (MB). Droplets carry no hypervisor, so sessions report no host identity.

pub mod models;

use async_trait::async_trait;
use idb_core::traits::{ComputeDriver, ComputeSession, Endpoint, InstanceInfo};
use idb_core::{DriverKind, Error, Registry, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::models::DropletListResponse;

/// Driver name used in errors and logs
const DRIVER_NAME: &str = "digitalocean";

/// DigitalOcean API base URL, without the version segment
pub const DEFAULT_API_BASE: &str = "https://api.digitalocean.com";

/// Droplets requested per page (API maximum)
const PER_PAGE: u32 = 200;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on followed pages, guards against a `next` link loop
const MAX_PAGES: usize = 1000;

/// Compute driver for the DigitalOcean REST API
#[derive(Debug, Clone)]
pub struct DigitalOceanDriver {
    /// API base URL (overridable for tests)
    api_base: String,
}

impl DigitalOceanDriver {
    /// Create a driver against the public API
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    /// Create a driver against a different API base URL
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for DigitalOceanDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComputeDriver for DigitalOceanDriver {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn ComputeSession>> {
        let (token, api_version) = match endpoint {
            Endpoint::Cloud { token, api_version } => (token, api_version),
            Endpoint::Hypervisor { .. } => {
                return Err(Error::driver(
                    DRIVER_NAME,
                    "hypervisor endpoints are not supported, expected an API token",
                ));
            }
        };

        if token.is_empty() {
            return Err(Error::driver(DRIVER_NAME, "API token is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        let droplets_url = format!(
            "{}/{}/droplets",
            self.api_base,
            api_version.trim_matches('/')
        );
        let droplets_url = reqwest::Url::parse(&droplets_url).map_err(|e| {
            Error::driver(DRIVER_NAME, format!("Invalid API URL {}: {}", droplets_url, e))
        })?;

        Ok(Box::new(DigitalOceanSession {
            droplets_url,
            token: token.clone(),
            client,
        }))
    }

    fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }
}

/// Authenticated access to one DigitalOcean account
pub struct DigitalOceanSession {
    /// `{base}/{version}/droplets`
    droplets_url: reqwest::Url,

    /// DigitalOcean API token
    /// ⚠️ NEVER log this value
    token: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for DigitalOceanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalOceanSession")
            .field("droplets_url", &self.droplets_url)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl DigitalOceanSession {
    /// First page of the droplet listing
    fn first_page(&self) -> reqwest::Url {
        let mut url = self.droplets_url.clone();
        url.query_pairs_mut()
            .append_pair("page", "1")
            .append_pair("per_page", &PER_PAGE.to_string());
        url
    }

    /// Resolve a `links.pages.next` value, refusing other origins
    fn next_page(&self, link: &str) -> Result<reqwest::Url> {
        let url = reqwest::Url::parse(link).map_err(|e| {
            Error::driver(DRIVER_NAME, format!("Invalid next page link {}: {}", link, e))
        })?;

        if url.origin() != self.droplets_url.origin() {
            return Err(Error::driver(
                DRIVER_NAME,
                format!(
                    "Refusing next page link to foreign origin {}",
                    url.origin().ascii_serialization()
                ),
            ));
        }

        Ok(url)
    }

    /// Fetch one page of droplets
    async fn get_page(&self, url: &reqwest::Url) -> Result<DropletListResponse> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| Error::http(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(match status.as_u16() {
                401 | 403 => Error::driver(
                    DRIVER_NAME,
                    format!("Authentication failed, check the API token. Status: {}", status),
                ),
                _ => Error::driver(DRIVER_NAME, format!("API error: {} - {}", status, body)),
            });
        }

        response
            .json()
            .await
            .map_err(|e| Error::driver(DRIVER_NAME, format!("Failed to parse droplet list: {}", e)))
    }
}

#[async_trait]
impl ComputeSession for DigitalOceanSession {
    async fn list_instances(&self) -> Result<Vec<InstanceInfo>> {
        let mut instances = Vec::new();
        let mut next = Some(self.first_page());
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(Error::driver(
                    DRIVER_NAME,
                    format!("Gave up after {} pages of droplets", MAX_PAGES),
                ));
            }

            let page = self.get_page(&url).await?;
            next = page
                .next_page()
                .map(|link| self.next_page(link))
                .transpose()?;

            instances.extend(page.droplets.into_iter().map(|droplet| InstanceInfo {
                name: droplet.name,
                host_hint: None,
                cpu: droplet.vcpus,
                memory_mb: droplet.memory,
            }));
        }

        debug!("{} droplet(s) in {} page(s)", instances.len(), pages);
        Ok(instances)
    }
}

/// Register the DigitalOcean driver with a registry
pub fn register(registry: &mut Registry) {
    registry.register_driver(DriverKind::DigitalOcean, Arc::new(DigitalOceanDriver::new()));
}
