//! Protocol v3: per-record probe, then create or update
//!
//! Each record walks this state machine:
//!
//! ```text
//! Unknown ──GET 2xx──► Exists ──PUT──► Updated
//!    │
//!    └──GET non-2xx──► Missing ──POST (create = true)──► Created
//!                         └──────(create = false)──────► Skipped
//! ```
//!
//! A record whose probe or write request fails at the transport level, or
//! whose write is refused, ends up `Failed`.

use async_trait::async_trait;
use idb_core::config::{InventoryConfig, ProtocolVersion};
use idb_core::traits::{InventoryClient, RecordOutcome, SubmitReport};
use idb_core::{Error, MachineRecord, Result};
use tracing::{Instrument, debug, debug_span, error, info, warn};

use crate::{TOKEN_HEADER, http_client, status_error};

/// IDB client for protocol v3 backends
pub struct InventoryClientV3 {
    /// Base URL of the IDB API
    base_url: String,

    /// IDB API token
    /// ⚠️ NEVER log this value
    token: String,

    /// Create machines the probe did not find
    create: bool,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for InventoryClientV3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryClientV3")
            .field("base_url", &self.base_url)
            .field("token", &"<REDACTED>")
            .field("create", &self.create)
            .finish()
    }
}

/// Result of the existence probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Exists,
    Missing,
}

impl InventoryClientV3 {
    /// Create a v3 client
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        create: bool,
        verify: bool,
    ) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            create,
            client: http_client(verify)?,
        })
    }

    /// Create a v3 client from a zone's `idb` block
    pub fn from_config(config: &InventoryConfig) -> Result<Self> {
        Self::new(&config.url, &config.token, config.create, config.verify)
    }

    /// `{base}/machines/{fqdn}` with the fqdn as one percent-encoded segment
    ///
    /// `#`, `?` or `/` inside an fqdn must never address another record.
    fn machine_url(&self, fqdn: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::config(format!("Invalid IDB URL {}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| Error::config(format!("IDB URL {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push("machines")
            .push(fqdn);

        Ok(url)
    }

    /// Check whether the IDB knows `fqdn`
    ///
    /// Any non-2xx answer counts as missing; only transport failures are
    /// errors.
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /machines/:fqdn
    /// X-IDB-API-Token: <token>
    /// ```
    async fn probe(&self, fqdn: &str, url: &reqwest::Url) -> Result<Probe> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| Error::http(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(Probe::Exists);
        }

        if status.as_u16() != 404 {
            warn!("Existence check for {} returned {}, treating as missing", fqdn, status);
        }
        Ok(Probe::Missing)
    }

    /// Create a machine
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /machines
    /// X-IDB-API-Token: <token>
    /// Content-Type: application/json
    ///
    /// {"fqdn": "...", "vmhost": "...", "device_type_id": 2, ...}
    /// ```
    async fn create_machine(&self, machine: &MachineRecord) -> Result<()> {
        let url = format!("{}/machines", self.base_url);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, &self.token)
            .header("Content-Type", "application/json")
            .json(machine)
            .send()
            .await
            .map_err(|e| Error::http(format!("POST {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(status_error(response, "Create").await);
        }
        Ok(())
    }

    /// Update an existing machine
    ///
    /// # API Call
    ///
    /// ```http
    /// PUT /machines/:fqdn
    /// X-IDB-API-Token: <token>
    /// Content-Type: application/json
    ///
    /// {"fqdn": "...", "vmhost": "...", "device_type_id": 2, ...}
    /// ```
    async fn update_machine(&self, machine: &MachineRecord, url: &reqwest::Url) -> Result<()> {
        debug!("PUT {}", url);

        let response = self
            .client
            .put(url.clone())
            .header(TOKEN_HEADER, &self.token)
            .header("Content-Type", "application/json")
            .json(machine)
            .send()
            .await
            .map_err(|e| Error::http(format!("PUT {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(status_error(response, "Update").await);
        }
        Ok(())
    }

    /// Reconcile one record; returns its outcome and the requests it took
    async fn reconcile(&self, machine: &MachineRecord) -> (RecordOutcome, usize) {
        let url = match self.machine_url(&machine.fqdn) {
            Ok(url) => url,
            Err(e) => {
                error!("Cannot address {}: {}", machine.fqdn, e);
                return (RecordOutcome::Failed, 0);
            }
        };

        let probe = match self.probe(&machine.fqdn, &url).await {
            Ok(probe) => probe,
            Err(e) => {
                error!("Existence check failed: {}", e);
                return (RecordOutcome::Failed, 1);
            }
        };

        match probe {
            Probe::Exists => match self.update_machine(machine, &url).await {
                Ok(()) => {
                    debug!("Updated {}", machine.fqdn);
                    (RecordOutcome::Updated, 2)
                }
                Err(e) => {
                    error!("Update of {} failed: {}", machine.fqdn, e);
                    (RecordOutcome::Failed, 2)
                }
            },
            Probe::Missing if self.create => match self.create_machine(machine).await {
                Ok(()) => {
                    info!("Created {}", machine.fqdn);
                    (RecordOutcome::Created, 2)
                }
                Err(e) => {
                    error!("Creation of {} failed: {}", machine.fqdn, e);
                    (RecordOutcome::Failed, 2)
                }
            },
            Probe::Missing => {
                debug!("{} is not in the IDB and creation is disabled, skipping", machine.fqdn);
                (RecordOutcome::Skipped, 1)
            }
        }
    }
}

#[async_trait]
impl InventoryClient for InventoryClientV3 {
    /// Reconcile machines one at a time, in input order
    async fn submit(&self, machines: &[MachineRecord]) -> SubmitReport {
        info!(
            "Reconciling {} machine(s) with IDB API at {}",
            machines.len(),
            self.base_url
        );

        let mut report = SubmitReport::default();

        for machine in machines {
            if !machine.is_submittable() {
                warn!("Skipping machine without fqdn: {:?}", machine);
                report.push(machine.fqdn.clone(), RecordOutcome::Skipped);
                continue;
            }

            let span = debug_span!("record", fqdn = %machine.fqdn);
            let (outcome, requests) = self.reconcile(machine).instrument(span).await;

            report.requests += requests;
            report.push(machine.fqdn.clone(), outcome);
        }

        report
    }

    fn protocol(&self) -> ProtocolVersion {
        ProtocolVersion::V3
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_url() {
        let client = InventoryClientV3::new("https://idb.example.org/api/v3/", "t", false, true)
            .unwrap();
        assert_eq!(
            client.machine_url("vm1.example.org").unwrap().as_str(),
            "https://idb.example.org/api/v3/machines/vm1.example.org"
        );

        let client = InventoryClientV3::new("https://idb.example.org", "t", false, true).unwrap();
        assert_eq!(
            client.machine_url("vm1").unwrap().as_str(),
            "https://idb.example.org/machines/vm1"
        );
    }

    #[test]
    fn test_machine_url_encodes_fqdn_as_one_segment() {
        let client = InventoryClientV3::new("https://idb.example.org/api", "t", false, true)
            .unwrap();

        assert_eq!(
            client.machine_url("web#staging").unwrap().path(),
            "/api/machines/web%23staging"
        );
        assert_eq!(
            client.machine_url("db?old").unwrap().path(),
            "/api/machines/db%3Fold"
        );
        assert_eq!(
            client.machine_url("a/b").unwrap().path(),
            "/api/machines/a%2Fb"
        );
        assert!(client.machine_url("db?old").unwrap().query().is_none());
    }

    #[test]
    fn test_machine_url_rejects_unusable_base() {
        let client = InventoryClientV3::new("mailto:idb@example.org", "t", false, true).unwrap();
        assert!(client.machine_url("vm1").is_err());

        let client = InventoryClientV3::new("not a url", "t", false, true).unwrap();
        assert!(client.machine_url("vm1").is_err());
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let client = InventoryClientV3::new("u", "secret_token_12345", true, true).unwrap();
        let debug_str = format!("{:?}", client);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("InventoryClientV3"));
    }
}
