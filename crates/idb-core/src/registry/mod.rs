//! Driver and inventory client registry
//!
//! The registry holds the concrete implementations a zone can be built from:
//! one [`ComputeDriver`] per [`DriverKind`] and one
//! [`InventoryClientFactory`] per [`ProtocolVersion`]. Implementation crates
//! register themselves during initialization:
//!
//! ```rust,ignore
//! use idb_core::Registry;
//!
//! let mut registry = Registry::new();
//! idb_driver_libvirt::register(&mut registry);
//! idb_driver_digitalocean::register(&mut registry);
//! idb_inventory::register(&mut registry);
//! ```
//!
//! Lookups are keyed by the closed enums produced by configuration parsing,
//! so unknown names never reach the registry; a missing entry means the
//! binary was built without the matching crate.

use crate::config::{DriverKind, InventoryConfig, ProtocolVersion};
use crate::error::{Error, Result};
use crate::traits::{ComputeDriver, InventoryClient, InventoryClientFactory};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of compute drivers and inventory client factories
#[derive(Default)]
pub struct Registry {
    /// Registered compute drivers
    drivers: HashMap<DriverKind, Arc<dyn ComputeDriver>>,

    /// Registered inventory client factories
    inventories: HashMap<ProtocolVersion, Box<dyn InventoryClientFactory>>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the driver used for zones of `kind`
    ///
    /// Registering twice replaces the earlier driver.
    pub fn register_driver(&mut self, kind: DriverKind, driver: Arc<dyn ComputeDriver>) {
        self.drivers.insert(kind, driver);
    }

    /// Register the client factory used for backends speaking `protocol`
    pub fn register_inventory(
        &mut self,
        protocol: ProtocolVersion,
        factory: Box<dyn InventoryClientFactory>,
    ) {
        self.inventories.insert(protocol, factory);
    }

    /// Get the driver for `kind`
    pub fn driver(&self, kind: DriverKind) -> Result<Arc<dyn ComputeDriver>> {
        self.drivers
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::config(format!("No driver registered for {}", kind)))
    }

    /// Create an inventory client for a zone's `idb` block
    pub fn create_inventory(&self, config: &InventoryConfig) -> Result<Box<dyn InventoryClient>> {
        let factory = self.inventories.get(&config.protocol).ok_or_else(|| {
            Error::config(format!(
                "No inventory client registered for protocol {}",
                config.protocol
            ))
        })?;

        factory.create(config)
    }

    /// Check if a driver is registered for `kind`
    pub fn has_driver(&self, kind: DriverKind) -> bool {
        self.drivers.contains_key(&kind)
    }

    /// Check if an inventory client factory is registered for `protocol`
    pub fn has_inventory(&self, protocol: ProtocolVersion) -> bool {
        self.inventories.contains_key(&protocol)
    }
}
