//! Test doubles and common utilities for zone and run contract tests
//!
//! These doubles stand in for real provider drivers and inventory backends
//! and record every call made through them.

#![allow(dead_code)]

use idb_core::config::{InventoryConfig, ProtocolVersion};
use idb_core::error::{Error, Result};
use idb_core::traits::{
    ComputeDriver, ComputeSession, Endpoint, InstanceInfo, InventoryClient,
    InventoryClientFactory, RecordOutcome, SubmitReport,
};
use idb_core::{DriverKind, MachineRecord, Registry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What a scripted endpoint does when connected to
#[derive(Clone)]
pub enum Script {
    /// `connect` fails
    Unreachable(String),
    /// `connect` succeeds, `host_identity` fails
    BrokenIdentity,
    /// `connect` succeeds, `list_instances` fails
    BrokenListing { hostname: String },
    /// Everything succeeds
    Healthy {
        hostname: Option<String>,
        instances: Vec<InstanceInfo>,
    },
}

impl Script {
    /// A healthy hypervisor named `hostname` running `names`
    pub fn hypervisor(hostname: &str, names: &[&str]) -> Self {
        Script::Healthy {
            hostname: Some(hostname.to_string()),
            instances: names.iter().map(|n| InstanceInfo::named(*n)).collect(),
        }
    }

    /// A healthy cloud account with `names`
    pub fn cloud(names: &[&str]) -> Self {
        Script::Healthy {
            hostname: None,
            instances: names.iter().map(|n| InstanceInfo::named(*n)).collect(),
        }
    }
}

/// Key under which cloud endpoints are scripted
pub const CLOUD: &str = "cloud";

/// A driver whose endpoints behave according to a script
#[derive(Clone, Default)]
pub struct ScriptedDriver {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    connects: Arc<Mutex<Vec<Endpoint>>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the endpoint with management URI (or [`CLOUD`]) `key`
    pub fn with(self, key: &str, script: Script) -> Self {
        self.scripts.lock().unwrap().insert(key.to_string(), script);
        self
    }

    /// Endpoints connected to, in order
    pub fn connects(&self) -> Vec<Endpoint> {
        self.connects.lock().unwrap().clone()
    }
}

struct ScriptedSession {
    script: Script,
}

#[async_trait::async_trait]
impl ComputeSession for ScriptedSession {
    async fn list_instances(&self) -> Result<Vec<InstanceInfo>> {
        match &self.script {
            Script::Healthy { instances, .. } => Ok(instances.clone()),
            _ => Err(Error::driver("scripted", "listing failed")),
        }
    }

    async fn host_identity(&self) -> Result<Option<String>> {
        match &self.script {
            Script::Healthy { hostname, .. } => Ok(hostname.clone()),
            Script::BrokenListing { hostname } => Ok(Some(hostname.clone())),
            _ => Err(Error::driver("scripted", "identity failed")),
        }
    }
}

#[async_trait::async_trait]
impl ComputeDriver for ScriptedDriver {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn ComputeSession>> {
        self.connects.lock().unwrap().push(endpoint.clone());

        let key = match endpoint {
            Endpoint::Hypervisor { uri } => uri.as_str(),
            Endpoint::Cloud { .. } => CLOUD,
        };

        match self.scripts.lock().unwrap().get(key).cloned() {
            Some(Script::Unreachable(msg)) => Err(Error::driver("scripted", msg)),
            Some(script) => Ok(Box::new(ScriptedSession { script })),
            None => Err(Error::driver("scripted", format!("no route to {}", key))),
        }
    }

    fn driver_name(&self) -> &'static str {
        "scripted"
    }
}

/// An inventory client that records what it was asked to submit
#[derive(Clone)]
pub struct RecordingInventory {
    protocol: ProtocolVersion,
    url: String,
    submissions: Arc<Mutex<Vec<Vec<MachineRecord>>>>,
    fail_all: bool,
}

impl RecordingInventory {
    pub fn new(protocol: ProtocolVersion, url: &str) -> Self {
        Self {
            protocol,
            url: url.to_string(),
            submissions: Arc::new(Mutex::new(Vec::new())),
            fail_all: false,
        }
    }

    /// Report every record as failed
    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Batches passed to `submit`, in order
    pub fn submissions(&self) -> Vec<Vec<MachineRecord>> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl InventoryClient for RecordingInventory {
    async fn submit(&self, machines: &[MachineRecord]) -> SubmitReport {
        self.submissions.lock().unwrap().push(machines.to_vec());

        let outcome = if self.fail_all {
            RecordOutcome::Failed
        } else {
            RecordOutcome::Sent
        };

        let mut report = SubmitReport::default();
        for machine in machines {
            report.push(machine.fqdn.clone(), outcome);
        }
        report.requests = 1;
        report
    }

    fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    fn base_url(&self) -> &str {
        &self.url
    }
}

/// Hands out [`RecordingInventory`] clients and keeps a handle on each,
/// keyed by backend URL
#[derive(Clone, Default)]
pub struct RecordingFactory {
    created: Arc<Mutex<Vec<RecordingInventory>>>,
    failing_urls: Arc<Mutex<Vec<String>>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clients created for `url` report every record as failed
    pub fn failing_for(self, url: &str) -> Self {
        self.failing_urls.lock().unwrap().push(url.to_string());
        self
    }

    /// Client created for `url`, if any
    pub fn client_for(&self, url: &str) -> Option<RecordingInventory> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.url == url)
            .cloned()
    }

    /// Number of clients created so far
    pub fn created(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl InventoryClientFactory for RecordingFactory {
    fn create(&self, config: &InventoryConfig) -> Result<Box<dyn InventoryClient>> {
        let mut client = RecordingInventory::new(config.protocol, &config.url);
        if self.failing_urls.lock().unwrap().contains(&config.url) {
            client = client.failing();
        }
        self.created.lock().unwrap().push(client.clone());
        Ok(Box::new(client))
    }
}

/// Registry wired with the same scripted driver for both kinds and a
/// recording factory for both protocols
pub fn registry_with(driver: &ScriptedDriver, factory: &RecordingFactory) -> Registry {
    let mut registry = Registry::new();
    registry.register_driver(DriverKind::Libvirt, Arc::new(driver.clone()));
    registry.register_driver(DriverKind::DigitalOcean, Arc::new(driver.clone()));
    registry.register_inventory(ProtocolVersion::V2, Box::new(factory.clone()));
    registry.register_inventory(ProtocolVersion::V3, Box::new(factory.clone()));
    registry
}

/// An `idb` block pointing at `url`
pub fn idb_block(version: u8, url: &str) -> serde_json::Value {
    serde_json::json!({"version": version, "url": url, "token": "idbtoken"})
}
