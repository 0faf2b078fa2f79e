//! Protocol v2: bulk overwrite in chunks

use async_trait::async_trait;
use idb_core::config::{DEFAULT_CHUNK_SIZE, InventoryConfig, ProtocolVersion};
use idb_core::traits::{InventoryClient, RecordOutcome, SubmitReport};
use idb_core::{Error, MachineRecord, Result};
use tracing::{debug, error, info, warn};

use crate::{TOKEN_HEADER, http_client, status_error};

/// IDB client for protocol v2 backends
pub struct InventoryClientV2 {
    /// Base URL of the IDB API
    base_url: String,

    /// IDB API token
    /// ⚠️ NEVER log this value
    token: String,

    /// Ask the backend to create machines it does not know
    create: bool,

    /// Machines per `PUT /machines` request
    chunk_size: usize,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for InventoryClientV2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryClientV2")
            .field("base_url", &self.base_url)
            .field("token", &"<REDACTED>")
            .field("create", &self.create)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl InventoryClientV2 {
    /// Create a v2 client
    ///
    /// A `chunk_size` of zero falls back to the default of 10.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        create: bool,
        verify: bool,
        chunk_size: usize,
    ) -> Result<Self> {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            create,
            chunk_size,
            client: http_client(verify)?,
        })
    }

    /// Create a v2 client from a zone's `idb` block
    pub fn from_config(config: &InventoryConfig) -> Result<Self> {
        Self::new(
            &config.url,
            &config.token,
            config.create,
            config.verify,
            config.chunk_size,
        )
    }

    /// Machines per request
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Request body for one chunk
    fn chunk_body(&self, chunk: &[&MachineRecord]) -> serde_json::Value {
        serde_json::json!({
            "create_machine": self.create,
            "machines": chunk,
        })
    }

    /// Send one chunk
    ///
    /// # API Call
    ///
    /// ```http
    /// PUT /machines
    /// X-IDB-API-Token: <token>
    /// Content-Type: application/json
    ///
    /// {"create_machine": false, "machines": [{"fqdn": "...", ...}, ...]}
    /// ```
    async fn put_chunk(&self, chunk: &[&MachineRecord]) -> Result<()> {
        let url = format!("{}/machines", self.base_url);
        let body = self.chunk_body(chunk);

        debug!("PUT {}\n{}", url, body);

        let response = self
            .client
            .put(&url)
            .header(TOKEN_HEADER, &self.token)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::http(format!("PUT {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(response, "Chunk upload").await);
        }

        let text = response.text().await.unwrap_or_default();
        debug!("{}\n{}", status, text);

        Ok(())
    }
}

#[async_trait]
impl InventoryClient for InventoryClientV2 {
    /// Submit machines in consecutive chunks
    ///
    /// Chunks go out in order; a failed chunk marks its records as failed and
    /// the next chunk is still sent.
    async fn submit(&self, machines: &[MachineRecord]) -> SubmitReport {
        let mut report = SubmitReport::default();

        let mut valid = Vec::with_capacity(machines.len());
        for machine in machines {
            if machine.is_submittable() {
                valid.push(machine);
            } else {
                warn!("Skipping machine without fqdn: {:?}", machine);
                report.push(machine.fqdn.clone(), RecordOutcome::Skipped);
            }
        }

        let chunks = valid.len().div_ceil(self.chunk_size);
        info!(
            "Sending {} machine(s) in {} chunk(s) to IDB API at {}",
            valid.len(),
            chunks,
            self.base_url
        );

        for (index, chunk) in valid.chunks(self.chunk_size).enumerate() {
            report.requests += 1;

            let outcome = match self.put_chunk(chunk).await {
                Ok(()) => RecordOutcome::Sent,
                Err(e) => {
                    error!("Chunk {}/{} failed: {}", index + 1, chunks, e);
                    RecordOutcome::Failed
                }
            };

            for machine in chunk {
                report.push(machine.fqdn.clone(), outcome);
            }
        }

        report
    }

    fn protocol(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
