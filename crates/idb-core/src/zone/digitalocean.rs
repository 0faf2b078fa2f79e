// # DigitalOcean Zone
//
// Lists the droplets of one DigitalOcean account. There is a single
// list call per cycle, so a failure leaves the zone with no machines at all
// rather than a partial list.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::Result;
use crate::machine::MachineRecord;
use crate::traits::{ComputeDriver, Endpoint};

/// Provider zone backed by a DigitalOcean account
pub struct DigitalOceanZone {
    /// DigitalOcean API token
    /// ⚠️ NEVER log this value
    token: String,

    /// DigitalOcean API version (e.g. "v2")
    version: String,

    /// Driver used to reach the API
    driver: Arc<dyn ComputeDriver>,
}

impl DigitalOceanZone {
    /// Create a zone for the account behind `token`
    pub fn new(
        token: impl Into<String>,
        version: impl Into<String>,
        driver: Arc<dyn ComputeDriver>,
    ) -> Self {
        Self {
            token: token.into(),
            version: version.into(),
            driver,
        }
    }

    /// Configured API version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// List the account's droplets; empty on failure
    pub async fn enumerate(&self) -> Vec<MachineRecord> {
        info!("DigitalOceanZone: retrieving nodes");

        match self.list().await {
            Ok(machines) => machines,
            Err(e) => {
                error!("DigitalOceanZone: {}, continuing with next zone", e);
                Vec::new()
            }
        }
    }

    async fn list(&self) -> Result<Vec<MachineRecord>> {
        let endpoint = Endpoint::Cloud {
            token: self.token.clone(),
            api_version: self.version.clone(),
        };

        let session = self.driver.connect(&endpoint).await?;

        let machines = session
            .list_instances()
            .await?
            .into_iter()
            .map(|instance| {
                debug!("DigitalOceanZone: got node {:?}", instance);
                MachineRecord::new(instance.name, "")
                    .with_cpu_count(instance.cpu)
                    .with_memory_mb(instance.memory_mb)
            })
            .collect();

        Ok(machines)
    }
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for DigitalOceanZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalOceanZone")
            .field("token", &"<REDACTED>")
            .field("version", &self.version)
            .field("driver", &self.driver.driver_name())
            .finish()
    }
}
