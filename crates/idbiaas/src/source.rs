//! Where the adapter configuration comes from
//!
//! Either a local JSON file or the IDB itself, which serves the document as
//! a JSON string inside its `cloud_providers` listing.

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cli::Cli;

/// Header carrying the IDB API token
const TOKEN_HEADER: &str = "X-IDB-API-Token";

/// Timeout for the configuration fetch (30 seconds)
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of the configuration document
#[derive(Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Local JSON file
    File(PathBuf),

    /// `GET {url}/cloud_providers` on the IDB API
    Remote {
        url: String,
        /// ⚠️ NEVER log this value
        token: String,
        verify: bool,
    },
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => f.debug_tuple("File").field(path).finish(),
            ConfigSource::Remote { url, verify, .. } => f
                .debug_struct("Remote")
                .field("url", url)
                .field("token", &"<REDACTED>")
                .field("verify", verify)
                .finish(),
        }
    }
}

/// One entry of the `cloud_providers` listing
#[derive(Debug, Deserialize)]
struct CloudProvider {
    /// Configuration document, JSON encoded as a string
    config: String,
}

impl ConfigSource {
    /// Pick the source named on the command line
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        match (&cli.config, &cli.url) {
            (Some(path), None) => Ok(ConfigSource::File(path.clone())),
            (None, Some(url)) => {
                let token = cli
                    .token
                    .clone()
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| anyhow!("--token (or IDB_API_TOKEN) is required with --url"))?;

                Ok(ConfigSource::Remote {
                    url: url.trim_end_matches('/').to_string(),
                    token,
                    verify: cli.verify_tls(),
                })
            }
            _ => bail!("exactly one of --config and --url is required"),
        }
    }

    /// Load the configuration document
    pub async fn load(&self) -> Result<Value> {
        match self {
            ConfigSource::File(path) => {
                info!("Using config file {}", path.display());
                load_file(path)
            }
            ConfigSource::Remote { url, token, verify } => {
                info!("Fetching config from {}", url);
                fetch_remote(url, token, *verify).await
            }
        }
    }
}

fn load_file(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    serde_json::from_str(&text)
        .with_context(|| format!("Config file {} is not valid JSON", path.display()))
}

/// Fetch the configuration from the IDB
///
/// # API Call
///
/// ```http
/// GET /cloud_providers
/// X-IDB-API-Token: <token>
///
/// [{"config": "{\"zones\": [...]}"}, ...]
/// ```
async fn fetch_remote(url: &str, token: &str, verify: bool) -> Result<Value> {
    if !verify {
        warn!("TLS certificate verification disabled for config fetch");
    }

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .danger_accept_invalid_certs(!verify)
        .build()
        .context("Failed to build HTTP client")?;

    let endpoint = format!("{}/cloud_providers", url);
    debug!("GET {}", endpoint);

    let response = client
        .get(&endpoint)
        .header(TOKEN_HEADER, token)
        .send()
        .await
        .with_context(|| format!("GET {} failed", endpoint))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("GET {} returned {}: {}", endpoint, status, body);
    }

    let providers: Vec<CloudProvider> = response
        .json()
        .await
        .with_context(|| format!("Unexpected response from {}", endpoint))?;

    let first = providers
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("{} returned no cloud providers", endpoint))?;

    serde_json::from_str(&first.config).context("Cloud provider config is not valid JSON")
}
