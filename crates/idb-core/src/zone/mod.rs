//! Provider zones
//!
//! A [`Zone`] pairs a [`ProviderZone`], which enumerates machines, with the
//! [`InventoryClient`] its configuration selected. The two axes are picked
//! independently at load time and never re-examined:
//!
//! ```text
//! zone block ──► idb.version ──► InventoryClient (v2 | v3)
//!            └─► driver.name ──► ProviderZone    (libvirt | digitalocean)
//! ```

pub mod digitalocean;
pub mod libvirt;

pub use digitalocean::DigitalOceanZone;
pub use libvirt::LibvirtZone;

use serde_json::Value;

use crate::config::{DriverConfig, DriverKind, ZoneConfig};
use crate::error::Result;
use crate::machine::MachineRecord;
use crate::registry::Registry;
use crate::traits::{InventoryClient, SubmitReport};

/// Machine source of a zone
#[derive(Debug)]
pub enum ProviderZone {
    /// libvirt hypervisor fleet
    Libvirt(LibvirtZone),
    /// DigitalOcean account
    DigitalOcean(DigitalOceanZone),
}

impl ProviderZone {
    /// Build the provider zone a `driver` block describes
    pub fn from_config(config: &DriverConfig, registry: &Registry) -> Result<Self> {
        let driver = registry.driver(config.kind())?;

        Ok(match config {
            DriverConfig::Libvirt { hosts } => {
                ProviderZone::Libvirt(LibvirtZone::new(hosts.clone(), driver))
            }
            DriverConfig::DigitalOcean { token, version } => {
                ProviderZone::DigitalOcean(DigitalOceanZone::new(token, version, driver))
            }
        })
    }

    /// Enumerate the zone's machines
    ///
    /// Never fails: provider errors are logged and reduce the result.
    pub async fn enumerate(&self) -> Vec<MachineRecord> {
        match self {
            ProviderZone::Libvirt(zone) => zone.enumerate().await,
            ProviderZone::DigitalOcean(zone) => zone.enumerate().await,
        }
    }

    /// Which driver backs this zone
    pub fn kind(&self) -> DriverKind {
        match self {
            ProviderZone::Libvirt(_) => DriverKind::Libvirt,
            ProviderZone::DigitalOcean(_) => DriverKind::DigitalOcean,
        }
    }
}

/// A provider zone bound to its inventory backend
pub struct Zone {
    provider: ProviderZone,
    inventory: Box<dyn InventoryClient>,
}

impl Zone {
    /// Bind an already constructed provider zone and client
    pub fn new(provider: ProviderZone, inventory: Box<dyn InventoryClient>) -> Self {
        Self {
            provider,
            inventory,
        }
    }

    /// Parse and build a zone from its raw configuration block
    pub fn from_value(value: &Value, registry: &Registry) -> Result<Self> {
        Self::from_config(&ZoneConfig::from_value(value)?, registry)
    }

    /// Build a zone from a parsed configuration block
    ///
    /// The inventory client is created first, matching the order in which
    /// the configuration is validated.
    pub fn from_config(config: &ZoneConfig, registry: &Registry) -> Result<Self> {
        let inventory = registry.create_inventory(&config.inventory)?;
        let provider = ProviderZone::from_config(&config.driver, registry)?;

        Ok(Self::new(provider, inventory))
    }

    /// The zone's machine source
    pub fn provider(&self) -> &ProviderZone {
        &self.provider
    }

    /// The zone's bound inventory client
    pub fn inventory(&self) -> &dyn InventoryClient {
        self.inventory.as_ref()
    }

    /// Enumerate the zone's machines
    pub async fn enumerate(&self) -> Vec<MachineRecord> {
        self.provider.enumerate().await
    }

    /// Submit machines through the bound inventory client
    pub async fn submit(&self, machines: &[MachineRecord]) -> SubmitReport {
        self.inventory.submit(machines).await
    }
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zone")
            .field("provider", &self.provider)
            .field("protocol", &self.inventory.protocol())
            .field("url", &self.inventory.base_url())
            .finish()
    }
}
